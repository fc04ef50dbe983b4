//! Behaviour tests for the posting engine against the in-memory store.

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tally_shared::config::PostingConfig;
use tally_shared::types::{
    AccountId, ActorId, ApprovalId, DocumentLinkId, JournalEntryId, MovementId, OverrideId,
    ProductId, TenantId, TransactionSetId, ValidationIssueId, WarehouseId, approx_eq,
};

use super::*;
use crate::audit::{AuditAction, AuditError, InMemoryAuditLog, MockAuditSink};
use crate::inventory::{MovementStatus, MovementType, Product, StockLocation};
use crate::ledger::{
    Approval, ApprovalStatus, DocumentLink, EntityRef, IntentLine, IssueSeverity, IssueStatus,
    NewPostingRun, Override, PostingError, PostingIntent, RunState, TransactionSet,
    TransactionSetStatus, TransactionSource, ValidationIssue,
};
use crate::memory::InMemoryLedger;
use crate::store::{JournalWriter, MockJournalWriter, StoreError};

struct Fixture {
    store: InMemoryLedger,
    audit: InMemoryAuditLog,
    engine: PostingEngine,
    tenant: TenantId,
    actor: ActorId,
}

impl Fixture {
    fn new() -> Self {
        let store = InMemoryLedger::new();
        let writer: Arc<dyn JournalWriter> = Arc::new(store.clone());
        Self::build(store, writer, None)
    }

    fn with_writer(writer: MockJournalWriter) -> Self {
        Self::build(InMemoryLedger::new(), Arc::new(writer), None)
    }

    fn with_audit(audit: MockAuditSink) -> Self {
        let store = InMemoryLedger::new();
        let writer: Arc<dyn JournalWriter> = Arc::new(store.clone());
        Self::build(store, writer, Some(Arc::new(audit)))
    }

    fn build(
        store: InMemoryLedger,
        writer: Arc<dyn JournalWriter>,
        audit_override: Option<Arc<dyn AuditSink>>,
    ) -> Self {
        let audit = InMemoryAuditLog::new();
        let sink: Arc<dyn AuditSink> = match audit_override {
            Some(sink) => sink,
            None => Arc::new(audit.clone()),
        };
        let engine = PostingEngine::new(
            Arc::new(store.clone()),
            writer,
            sink,
            PostingConfig::default(),
        );
        Self {
            store,
            audit,
            engine,
            tenant: TenantId::new(),
            actor: ActorId::new(),
        }
    }

    async fn account(&self, code: &str) -> AccountId {
        let id = AccountId::new();
        self.store
            .insert_account(Account {
                id,
                tenant_id: self.tenant,
                code: code.to_string(),
                name: format!("Account {code}"),
                is_active: true,
            })
            .await;
        id
    }

    async fn transaction_set(&self, status: TransactionSetStatus) -> TransactionSetId {
        let id = TransactionSetId::new();
        self.store
            .insert_transaction_set(TransactionSet {
                id,
                tenant_id: self.tenant,
                status,
                source: TransactionSource::Manual,
                business_date: date(2026, 10, 1),
                note: None,
                created_by: self.actor,
                created_at: Utc::now(),
            })
            .await;
        id
    }

    async fn attach_document(&self, set: TransactionSetId) {
        self.store
            .insert_document_link(DocumentLink {
                id: DocumentLinkId::new(),
                tenant_id: self.tenant,
                entity: EntityRef::transaction_set(set),
                document_ref: "s3://invoices/INV-1001.pdf".to_string(),
            })
            .await;
    }

    async fn attach_intent(&self, set: TransactionSetId, lines: Vec<IntentLine>) {
        self.store
            .insert_posting_intent(PostingIntent {
                tenant_id: self.tenant,
                transaction_set_id: set,
                posting_date: date(2026, 10, 1),
                memo: Some("October rent".to_string()),
                lines,
            })
            .await;
    }

    /// A reviewed set with evidence and a rent intent of `debit`/`credit`.
    async fn rent_set(&self, debit: Decimal, credit: Decimal) -> TransactionSetId {
        self.account("1000").await;
        self.account("6100").await;
        let set = self.transaction_set(TransactionSetStatus::Review).await;
        self.attach_document(set).await;
        self.attach_intent(
            set,
            vec![
                IntentLine::debit(code("6100"), debit),
                IntentLine::credit(code("1000"), credit),
            ],
        )
        .await;
        set
    }

    async fn movement(
        &self,
        set: TransactionSetId,
        product_id: ProductId,
        movement_type: MovementType,
        quantity: Decimal,
        from: Option<StockLocation>,
        to: Option<StockLocation>,
        unit_cost: Option<Decimal>,
    ) -> MovementId {
        let id = MovementId::new();
        self.store
            .insert_movement(InventoryMovement {
                id,
                tenant_id: self.tenant,
                transaction_set_id: set,
                product_id,
                quantity,
                from,
                to,
                unit_cost,
                movement_type,
                status: MovementStatus::Draft,
            })
            .await;
        id
    }

    async fn status(&self, set: TransactionSetId) -> Option<TransactionSetStatus> {
        self.store
            .transaction_set(self.tenant, set)
            .await
            .unwrap()
            .map(|s| s.status)
    }

    async fn entry_count(&self) -> usize {
        self.store.journal_entries(self.tenant).await.len()
    }
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn code(code: &str) -> AccountRef {
    AccountRef::ByCode(code.to_string())
}

// ========== Posting ==========

#[tokio::test]
async fn test_post_creates_balanced_entry() {
    let fx = Fixture::new();
    let set = fx.rent_set(dec!(1500), dec!(1500)).await;

    let result = fx.engine.post(fx.tenant, fx.actor, set).await.unwrap();

    assert!(!result.idempotent);
    assert_eq!(result.transaction_set_id, set);
    assert_eq!(fx.status(set).await, Some(TransactionSetStatus::Posted));

    let lines = fx
        .store
        .journal_lines(fx.tenant, result.journal_entry_id)
        .await
        .unwrap();
    let debit: Decimal = lines.iter().map(|l| l.debit).sum();
    let credit: Decimal = lines.iter().map(|l| l.credit).sum();
    assert_eq!(lines.len(), 2);
    assert!(approx_eq(debit, credit));

    let runs = fx.store.posting_runs(fx.tenant, set).await;
    assert_eq!(runs.len(), 1);
    assert_eq!(
        runs[0].state,
        RunState::Succeeded {
            journal_entry_id: result.journal_entry_id
        }
    );
    assert_eq!(
        fx.audit.actions().await,
        vec![
            AuditAction::JournalEntryCreated,
            AuditAction::TransactionSetPosted
        ]
    );
}

#[tokio::test]
async fn test_post_is_idempotent() {
    let fx = Fixture::new();
    let set = fx.rent_set(dec!(250), dec!(250)).await;

    let first = fx.engine.post(fx.tenant, fx.actor, set).await.unwrap();
    let second = fx.engine.post(fx.tenant, fx.actor, set).await.unwrap();

    assert_eq!(first.journal_entry_id, second.journal_entry_id);
    assert_eq!(first.posting_run_id, second.posting_run_id);
    assert!(second.idempotent);
    assert_eq!(fx.entry_count().await, 1);
    assert_eq!(fx.audit.actions().await.len(), 2);
}

#[tokio::test]
async fn test_concurrent_posts_create_one_entry() {
    let fx = Fixture::new();
    let set = fx.rent_set(dec!(99.95), dec!(99.95)).await;

    let attempts = (0..8).map(|_| fx.engine.post(fx.tenant, fx.actor, set));
    let results = futures::future::join_all(attempts).await;

    let created: Vec<_> = results
        .iter()
        .filter_map(|r| r.as_ref().ok())
        .filter(|r| !r.idempotent)
        .collect();
    assert_eq!(created.len(), 1);
    for result in &results {
        match result {
            Ok(r) => assert_eq!(r.journal_entry_id, created[0].journal_entry_id),
            Err(err) => assert!(matches!(err, PostingError::InProgress(_)), "{err}"),
        }
    }
    assert_eq!(fx.entry_count().await, 1);
}

#[tokio::test]
async fn test_started_run_blocks_posting() {
    let fx = Fixture::new();
    let set = fx.rent_set(dec!(10), dec!(10)).await;
    fx.store
        .claim_posting_run(NewPostingRun::new(fx.tenant, set, ActorId::new(), None))
        .await
        .unwrap();

    let err = fx.engine.post(fx.tenant, fx.actor, set).await.unwrap_err();

    assert!(matches!(err, PostingError::InProgress(id) if id == set));
    assert!(err.is_retryable());
    assert_eq!(fx.entry_count().await, 0);
    assert_eq!(fx.status(set).await, Some(TransactionSetStatus::Review));
}

#[tokio::test]
async fn test_unbalanced_intent_rejected_and_retry_succeeds() {
    let fx = Fixture::new();
    let set = fx.rent_set(dec!(100), dec!(90)).await;

    let err = fx.engine.post(fx.tenant, fx.actor, set).await.unwrap_err();
    assert!(matches!(
        err,
        PostingError::Unbalanced { debit, credit } if debit == dec!(100) && credit == dec!(90)
    ));
    assert_eq!(fx.status(set).await, Some(TransactionSetStatus::Review));
    assert_eq!(fx.entry_count().await, 0);

    let runs = fx.store.posting_runs(fx.tenant, set).await;
    assert_eq!(runs.len(), 1);
    assert!(matches!(&runs[0].state, RunState::Failed { error } if error.contains("not balanced")));

    fx.attach_intent(
        set,
        vec![
            IntentLine::debit(code("6100"), dec!(100)),
            IntentLine::credit(code("1000"), dec!(100)),
        ],
    )
    .await;
    let result = fx.engine.post(fx.tenant, fx.actor, set).await.unwrap();

    let runs = fx.store.posting_runs(fx.tenant, set).await;
    assert_eq!(runs.len(), 2);
    assert_eq!(runs[1].retry_of, Some(runs[0].id));
    assert_eq!(runs[1].id, result.posting_run_id);
    assert_eq!(fx.entry_count().await, 1);
}

#[tokio::test]
async fn test_sub_scale_line_rejected_as_empty() {
    let fx = Fixture::new();
    let set = fx.rent_set(dec!(100), dec!(100)).await;
    fx.account("7000").await;
    fx.attach_intent(
        set,
        vec![
            IntentLine::debit(code("6100"), dec!(100)),
            IntentLine::debit(code("7000"), dec!(0.0000004)),
            IntentLine::credit(code("1000"), dec!(100)),
        ],
    )
    .await;

    let err = fx.engine.post(fx.tenant, fx.actor, set).await.unwrap_err();
    assert!(matches!(err, PostingError::EmptyLine(2)));
    assert_eq!(fx.entry_count().await, 0);
    assert_eq!(fx.status(set).await, Some(TransactionSetStatus::Review));
}

#[tokio::test]
async fn test_post_missing_set() {
    let fx = Fixture::new();
    let missing = TransactionSetId::new();
    let err = fx.engine.post(fx.tenant, fx.actor, missing).await.unwrap_err();
    assert!(matches!(err, PostingError::TransactionSetNotFound(id) if id == missing));
}

#[tokio::test]
async fn test_post_draft_not_submitted() {
    let fx = Fixture::new();
    let set = fx.transaction_set(TransactionSetStatus::Draft).await;
    fx.attach_document(set).await;

    let err = fx.engine.post(fx.tenant, fx.actor, set).await.unwrap_err();

    assert!(matches!(err, PostingError::NotSubmitted(_)));
    assert_eq!(fx.entry_count().await, 0);
}

#[tokio::test]
async fn test_pending_approval_blocks_posting() {
    let fx = Fixture::new();
    let set = fx.rent_set(dec!(10), dec!(10)).await;
    let approval = ApprovalId::new();
    fx.store
        .insert_approval(Approval {
            id: approval,
            tenant_id: fx.tenant,
            entity: EntityRef::transaction_set(set),
            status: ApprovalStatus::Pending,
        })
        .await;

    let err = fx.engine.post(fx.tenant, fx.actor, set).await.unwrap_err();

    assert!(matches!(err, PostingError::PendingApproval(id) if id == approval));
    assert_eq!(fx.entry_count().await, 0);
}

#[tokio::test]
async fn test_overridden_issue_allows_posting() {
    let fx = Fixture::new();
    let set = fx.rent_set(dec!(10), dec!(10)).await;
    let issue = ValidationIssueId::new();
    fx.store
        .insert_validation_issue(ValidationIssue {
            id: issue,
            tenant_id: fx.tenant,
            entity: EntityRef::transaction_set(set),
            severity: IssueSeverity::Error,
            status: IssueStatus::Open,
            message: "Amount exceeds PO".to_string(),
        })
        .await;

    let err = fx.engine.post(fx.tenant, fx.actor, set).await.unwrap_err();
    assert!(matches!(err, PostingError::UnresolvedValidation(id) if id == issue));

    fx.store
        .insert_override(Override {
            id: OverrideId::new(),
            tenant_id: fx.tenant,
            entity: EntityRef::transaction_set(set),
            validation_issue_id: Some(issue),
            reason: "Approved by controller".to_string(),
            created_by: fx.actor,
        })
        .await;
    assert!(fx.engine.post(fx.tenant, fx.actor, set).await.is_ok());
}

#[tokio::test]
async fn test_missing_evidence_blocks_posting() {
    let fx = Fixture::new();
    fx.account("1000").await;
    let set = fx.transaction_set(TransactionSetStatus::Review).await;
    fx.attach_intent(set, vec![IntentLine::debit(code("1000"), dec!(1))])
        .await;

    let err = fx.engine.post(fx.tenant, fx.actor, set).await.unwrap_err();

    assert!(matches!(err, PostingError::MissingEvidence(_)));
    assert_eq!(err.kind(), tally_shared::ErrorKind::Precondition);
}

#[tokio::test]
async fn test_inactive_account_rejected() {
    let fx = Fixture::new();
    fx.account("1000").await;
    fx.store
        .insert_account(Account {
            id: AccountId::new(),
            tenant_id: fx.tenant,
            code: "6200".to_string(),
            name: "Closed expense".to_string(),
            is_active: false,
        })
        .await;
    let set = fx.transaction_set(TransactionSetStatus::Review).await;
    fx.attach_document(set).await;
    fx.attach_intent(
        set,
        vec![
            IntentLine::credit(code("1000"), dec!(5)),
            IntentLine::debit(code("6200"), dec!(5)),
        ],
    )
    .await;

    let err = fx.engine.post(fx.tenant, fx.actor, set).await.unwrap_err();

    assert!(matches!(err, PostingError::UnknownAccount(2)));
    assert_eq!(fx.entry_count().await, 0);
}

#[tokio::test]
async fn test_missing_intent() {
    let fx = Fixture::new();
    let set = fx.transaction_set(TransactionSetStatus::Review).await;
    fx.attach_document(set).await;

    let err = fx.engine.post(fx.tenant, fx.actor, set).await.unwrap_err();
    assert!(matches!(err, PostingError::PostingIntentNotFound(_)));
}

#[tokio::test]
async fn test_audit_failure_does_not_roll_back() {
    let mut audit = MockAuditSink::new();
    audit
        .expect_log_audit_event()
        .returning(|_| Err(AuditError::Unavailable("queue full".to_string())));
    let fx = Fixture::with_audit(audit);
    let set = fx.rent_set(dec!(75), dec!(75)).await;

    let result = fx.engine.post(fx.tenant, fx.actor, set).await.unwrap();

    assert!(!result.idempotent);
    assert_eq!(fx.entry_count().await, 1);
    assert_eq!(fx.status(set).await, Some(TransactionSetStatus::Posted));
}

#[tokio::test]
async fn test_writer_fault_leaves_no_entry() {
    let mut writer = MockJournalWriter::new();
    writer
        .expect_commit_posting()
        .times(1)
        .returning(|_| Err(StoreError::Database("connection reset".to_string())));
    let fx = Fixture::with_writer(writer);
    let set = fx.rent_set(dec!(20), dec!(20)).await;

    let err = fx.engine.post(fx.tenant, fx.actor, set).await.unwrap_err();

    assert!(matches!(err, PostingError::Store(StoreError::Database(_))));
    assert!(err.is_retryable());
    assert_eq!(fx.entry_count().await, 0);
    assert_eq!(fx.status(set).await, Some(TransactionSetStatus::Review));
    let runs = fx.store.posting_runs(fx.tenant, set).await;
    assert!(matches!(runs[0].state, RunState::Failed { .. }));
    assert!(fx.audit.events().await.is_empty());
}

// ========== Submit for review ==========

#[tokio::test]
async fn test_submit_for_review() {
    let fx = Fixture::new();
    let set = fx.transaction_set(TransactionSetStatus::Draft).await;

    let submitted = fx
        .engine
        .submit_for_review(fx.tenant, fx.actor, set)
        .await
        .unwrap();
    assert_eq!(submitted.status, TransactionSetStatus::Review);

    let again = fx
        .engine
        .submit_for_review(fx.tenant, fx.actor, set)
        .await
        .unwrap();
    assert_eq!(again.status, TransactionSetStatus::Review);
    assert_eq!(
        fx.audit.actions().await,
        vec![AuditAction::TransactionSetSubmitted]
    );
}

#[tokio::test]
async fn test_submit_posted_or_missing_set() {
    let fx = Fixture::new();
    let posted = fx.transaction_set(TransactionSetStatus::Posted).await;
    assert!(matches!(
        fx.engine.submit_for_review(fx.tenant, fx.actor, posted).await,
        Err(PostingError::AlreadyPosted(_))
    ));
    assert!(matches!(
        fx.engine
            .submit_for_review(fx.tenant, fx.actor, TransactionSetId::new())
            .await,
        Err(PostingError::TransactionSetNotFound(_))
    ));
}

// ========== Reversal ==========

#[tokio::test]
async fn test_reverse_creates_mirror_entry() {
    let fx = Fixture::new();
    let set = fx.rent_set(dec!(1500), dec!(1500)).await;
    let posted = fx.engine.post(fx.tenant, fx.actor, set).await.unwrap();
    let original_lines = fx
        .store
        .journal_lines(fx.tenant, posted.journal_entry_id)
        .await
        .unwrap();

    let result = fx
        .engine
        .reverse(
            fx.tenant,
            fx.actor,
            posted.journal_entry_id,
            "Duplicate invoice",
            Some(date(2026, 10, 14)),
            None,
        )
        .await
        .unwrap();

    assert!(!result.idempotent);
    assert_eq!(result.original_journal_entry_id, posted.journal_entry_id);

    let mirror = fx
        .store
        .journal_lines(fx.tenant, result.reversal_journal_entry_id)
        .await
        .unwrap();
    assert_eq!(mirror.len(), original_lines.len());
    for (original, reversed) in original_lines.iter().zip(&mirror) {
        assert_eq!(reversed.account_id, original.account_id);
        assert_eq!(reversed.debit, original.credit);
        assert_eq!(reversed.credit, original.debit);
        assert!(
            reversed
                .description
                .as_deref()
                .is_some_and(|d| d.starts_with("Reversal: "))
        );
    }

    let entry = fx
        .store
        .journal_entry(fx.tenant, result.reversal_journal_entry_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(entry.posting_date, date(2026, 10, 14));
    assert_eq!(
        entry.memo,
        Some(format!(
            "Reversal of journal entry {}",
            posted.journal_entry_id
        ))
    );

    let reversal_set = fx
        .store
        .transaction_set(fx.tenant, result.reversal_transaction_set_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(reversal_set.status, TransactionSetStatus::Posted);
    assert_eq!(reversal_set.source, TransactionSource::Reversal);

    // The original is untouched.
    let after = fx
        .store
        .journal_lines(fx.tenant, posted.journal_entry_id)
        .await
        .unwrap();
    assert_eq!(after, original_lines);

    let actions = fx.audit.actions().await;
    assert_eq!(
        &actions[2..],
        &[
            AuditAction::JournalEntryCreated,
            AuditAction::ReversalLinkCreated
        ]
    );
}

#[tokio::test]
async fn test_reverse_is_idempotent() {
    let fx = Fixture::new();
    let set = fx.rent_set(dec!(40), dec!(40)).await;
    let posted = fx.engine.post(fx.tenant, fx.actor, set).await.unwrap();

    let first = fx
        .engine
        .reverse(fx.tenant, fx.actor, posted.journal_entry_id, "Wrong vendor", None, None)
        .await
        .unwrap();
    let second = fx
        .engine
        .reverse(fx.tenant, fx.actor, posted.journal_entry_id, "Wrong vendor", None, None)
        .await
        .unwrap();

    assert!(second.idempotent);
    assert_eq!(first.reversal_journal_entry_id, second.reversal_journal_entry_id);
    assert_eq!(fx.entry_count().await, 2);
}

#[tokio::test]
async fn test_reverse_requires_reason_and_entry() {
    let fx = Fixture::new();
    assert!(matches!(
        fx.engine
            .reverse(fx.tenant, fx.actor, JournalEntryId::new(), "  ", None, None)
            .await,
        Err(PostingError::ReasonRequired)
    ));

    let missing = JournalEntryId::new();
    assert!(matches!(
        fx.engine
            .reverse(fx.tenant, fx.actor, missing, "Cleanup", None, None)
            .await,
        Err(PostingError::JournalEntryNotFound(id)) if id == missing
    ));
}

// ========== Inventory ==========

async fn cost_accounts(fx: &Fixture) -> (AccountId, AccountId) {
    (fx.account("1300").await, fx.account("5000").await)
}

#[tokio::test]
async fn test_receipt_then_issue_updates_balances() {
    let fx = Fixture::new();
    let (inventory, cogs) = cost_accounts(&fx).await;
    let product = ProductId::new();
    let warehouse = StockLocation::warehouse(WarehouseId::new());

    let receipt_set = fx.transaction_set(TransactionSetStatus::Draft).await;
    let receipt = fx
        .movement(
            receipt_set,
            product,
            MovementType::Receipt,
            dec!(10),
            None,
            Some(warehouse),
            Some(dec!(2.50)),
        )
        .await;

    let received = fx
        .engine
        .post_inventory_movements(
            fx.tenant,
            fx.actor,
            receipt_set,
            InventoryPostingOptions::default(),
        )
        .await
        .unwrap();

    assert_eq!(received.balances.len(), 1);
    assert_eq!(received.balances[0].on_hand, dec!(10));
    assert_eq!(received.balances[0].available, dec!(10));
    assert_eq!(received.costed_movements, vec![receipt]);
    let entry_id = received.journal_entry_id().unwrap();
    let lines = fx.store.journal_lines(fx.tenant, entry_id).await.unwrap();
    assert_eq!(lines[0].account_id, inventory);
    assert_eq!(lines[0].debit, dec!(25));
    assert_eq!(lines[1].account_id, cogs);
    assert_eq!(lines[1].credit, dec!(25));
    assert_eq!(fx.status(receipt_set).await, Some(TransactionSetStatus::Posted));

    let issue_set = fx.transaction_set(TransactionSetStatus::Review).await;
    fx.movement(
        issue_set,
        product,
        MovementType::Issue,
        dec!(4),
        Some(warehouse),
        None,
        None,
    )
    .await;

    let issued = fx
        .engine
        .post_inventory_movements(
            fx.tenant,
            fx.actor,
            issue_set,
            InventoryPostingOptions::default(),
        )
        .await
        .unwrap();

    assert_eq!(issued.balances[0].on_hand, dec!(6));
    assert_eq!(issued.balances[0].available, dec!(6));
    assert_eq!(issued.cost_journal, CostJournal::NoCostedMovements);
    assert_eq!(fx.entry_count().await, 1);

    let actions = fx.audit.actions().await;
    assert_eq!(
        actions,
        vec![
            AuditAction::InventoryMovementPosted,
            AuditAction::JournalEntryCreated,
            AuditAction::TransactionSetPosted,
            AuditAction::InventoryMovementPosted,
            AuditAction::TransactionSetPosted,
        ]
    );
}

#[tokio::test]
async fn test_standard_cost_used_for_receipts() {
    let fx = Fixture::new();
    cost_accounts(&fx).await;
    let product = ProductId::new();
    fx.store
        .insert_product(Product {
            id: product,
            tenant_id: fx.tenant,
            sku: "WIDGET-01".to_string(),
            standard_cost: Some(dec!(3)),
        })
        .await;
    let set = fx.transaction_set(TransactionSetStatus::Draft).await;
    fx.movement(
        set,
        product,
        MovementType::Receipt,
        dec!(5),
        None,
        Some(StockLocation::warehouse(WarehouseId::new())),
        None,
    )
    .await;

    let result = fx
        .engine
        .post_inventory_movements(fx.tenant, fx.actor, set, InventoryPostingOptions::default())
        .await
        .unwrap();

    let entry_id = result.journal_entry_id().unwrap();
    let lines = fx.store.journal_lines(fx.tenant, entry_id).await.unwrap();
    assert_eq!(lines[0].debit, dec!(15));
    let entry = fx
        .store
        .journal_entry(fx.tenant, entry_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(entry.posting_date, date(2026, 10, 1));
}

#[tokio::test]
async fn test_missing_cogs_account_skips_journal() {
    let fx = Fixture::new();
    fx.account("1300").await;
    let set = fx.transaction_set(TransactionSetStatus::Draft).await;
    fx.movement(
        set,
        ProductId::new(),
        MovementType::Receipt,
        dec!(8),
        None,
        Some(StockLocation::warehouse(WarehouseId::new())),
        Some(dec!(1)),
    )
    .await;

    let result = fx
        .engine
        .post_inventory_movements(fx.tenant, fx.actor, set, InventoryPostingOptions::default())
        .await
        .unwrap();

    assert_eq!(result.cost_journal, CostJournal::SkippedMissingAccounts);
    assert_eq!(result.balances[0].on_hand, dec!(8));
    assert_eq!(result.movements[0].status, MovementStatus::Posted);
    assert_eq!(fx.entry_count().await, 0);
    assert_eq!(fx.status(set).await, Some(TransactionSetStatus::Posted));
}

#[tokio::test]
async fn test_account_codes_can_be_overridden() {
    let fx = Fixture::new();
    let inventory = fx.account("1350").await;
    fx.account("5100").await;
    let set = fx.transaction_set(TransactionSetStatus::Draft).await;
    fx.movement(
        set,
        ProductId::new(),
        MovementType::Receipt,
        dec!(2),
        None,
        Some(StockLocation::warehouse(WarehouseId::new())),
        Some(dec!(4)),
    )
    .await;

    let result = fx
        .engine
        .post_inventory_movements(
            fx.tenant,
            fx.actor,
            set,
            InventoryPostingOptions {
                memo: Some("Goods receipt GR-77".to_string()),
                inventory_account_code: Some("1350".to_string()),
                cogs_account_code: Some("5100".to_string()),
            },
        )
        .await
        .unwrap();

    let entry_id = result.journal_entry_id().unwrap();
    let entry = fx
        .store
        .journal_entry(fx.tenant, entry_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(entry.memo.as_deref(), Some("Goods receipt GR-77"));
    let lines = fx.store.journal_lines(fx.tenant, entry_id).await.unwrap();
    assert_eq!(lines[0].account_id, inventory);
}

#[tokio::test]
async fn test_inventory_posting_is_idempotent() {
    let fx = Fixture::new();
    cost_accounts(&fx).await;
    let set = fx.transaction_set(TransactionSetStatus::Draft).await;
    let warehouse = StockLocation::warehouse(WarehouseId::new());
    fx.movement(
        set,
        ProductId::new(),
        MovementType::Receipt,
        dec!(3),
        None,
        Some(warehouse),
        Some(dec!(10)),
    )
    .await;

    let first = fx
        .engine
        .post_inventory_movements(fx.tenant, fx.actor, set, InventoryPostingOptions::default())
        .await
        .unwrap();
    let second = fx
        .engine
        .post_inventory_movements(fx.tenant, fx.actor, set, InventoryPostingOptions::default())
        .await
        .unwrap();

    assert!(second.idempotent);
    assert_eq!(second.journal_entry_id(), first.journal_entry_id());
    assert_eq!(second.movements.len(), 1);
    assert_eq!(second.balances[0].on_hand, dec!(3));
    assert_eq!(fx.store.balances(fx.tenant).await[0].on_hand, dec!(3));
    assert_eq!(fx.entry_count().await, 1);
}

#[tokio::test]
async fn test_transfer_moves_stock_without_cost() {
    let fx = Fixture::new();
    cost_accounts(&fx).await;
    let product = ProductId::new();
    let north = StockLocation::warehouse(WarehouseId::new());
    let south = StockLocation::warehouse(WarehouseId::new());
    let set = fx.transaction_set(TransactionSetStatus::Draft).await;
    fx.movement(set, product, MovementType::Receipt, dec!(10), None, Some(north), None)
        .await;
    fx.movement(
        set,
        product,
        MovementType::Transfer,
        dec!(4),
        Some(north),
        Some(south),
        Some(dec!(9)),
    )
    .await;

    let result = fx
        .engine
        .post_inventory_movements(fx.tenant, fx.actor, set, InventoryPostingOptions::default())
        .await
        .unwrap();

    assert_eq!(result.cost_journal, CostJournal::NoCostedMovements);
    let balances = fx.store.balances(fx.tenant).await;
    let on_hand = |location: StockLocation| {
        balances
            .iter()
            .find(|b| b.key.location == location)
            .map(|b| b.on_hand)
    };
    assert_eq!(on_hand(north), Some(dec!(6)));
    assert_eq!(on_hand(south), Some(dec!(4)));
}

#[tokio::test]
async fn test_no_draft_movements() {
    let fx = Fixture::new();
    let set = fx.transaction_set(TransactionSetStatus::Draft).await;
    assert!(matches!(
        fx.engine
            .post_inventory_movements(fx.tenant, fx.actor, set, InventoryPostingOptions::default())
            .await,
        Err(PostingError::NoMovements(_))
    ));
    assert!(matches!(
        fx.engine
            .post_inventory_movements(
                fx.tenant,
                fx.actor,
                TransactionSetId::new(),
                InventoryPostingOptions::default()
            )
            .await,
        Err(PostingError::TransactionSetNotFound(_))
    ));
}

#[tokio::test]
async fn test_invalid_movement_changes_nothing() {
    let fx = Fixture::new();
    let set = fx.transaction_set(TransactionSetStatus::Draft).await;
    let warehouse = StockLocation::warehouse(WarehouseId::new());
    fx.movement(set, ProductId::new(), MovementType::Receipt, dec!(5), None, Some(warehouse), None)
        .await;
    let bad = fx
        .movement(set, ProductId::new(), MovementType::Receipt, Decimal::ZERO, None, Some(warehouse), None)
        .await;

    let err = fx
        .engine
        .post_inventory_movements(fx.tenant, fx.actor, set, InventoryPostingOptions::default())
        .await
        .unwrap_err();

    assert!(matches!(err, PostingError::InvalidMovement { movement_id, .. } if movement_id == bad));
    assert!(fx.store.balances(fx.tenant).await.is_empty());
    assert_eq!(fx.status(set).await, Some(TransactionSetStatus::Draft));
    let drafts = fx
        .store
        .movements(fx.tenant, set, Some(MovementStatus::Draft))
        .await
        .unwrap();
    assert_eq!(drafts.len(), 2);
}

#[tokio::test]
async fn test_inventory_writer_fault_is_returned() {
    let mut writer = MockJournalWriter::new();
    writer
        .expect_commit_inventory()
        .returning(|_| Err(StoreError::Database("deadlock detected".to_string())));
    let fx = Fixture::with_writer(writer);
    let set = fx.transaction_set(TransactionSetStatus::Draft).await;
    fx.movement(
        set,
        ProductId::new(),
        MovementType::Receipt,
        dec!(1),
        None,
        Some(StockLocation::warehouse(WarehouseId::new())),
        None,
    )
    .await;

    let err = fx
        .engine
        .post_inventory_movements(fx.tenant, fx.actor, set, InventoryPostingOptions::default())
        .await
        .unwrap_err();

    assert_eq!(err.error_code(), "DATABASE_ERROR");
    assert!(fx.audit.events().await.is_empty());
    assert_eq!(fx.status(set).await, Some(TransactionSetStatus::Draft));
}
