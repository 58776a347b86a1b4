//! Run orchestration: bootstrap, then every roster row in input order.

use tracing::{info, warn};

use crate::audit::{AuditEntry, AuditSink, AuditStep, BOOTSTRAP_LOGIN};
use crate::error::{SyncError, SyncResult};
use crate::executor::{ActionExecutor, RowOutcome};
use crate::model::{DesiredUserRow, RosterRecord, RowValidationError};
use crate::muf::AttributeCatalog;
use crate::preflight;
use crate::reconciler::{classify, ReconcileContext};
use crate::roles::RoleMapping;
use crate::services::{DirectoryService, ProvisioningService};
use crate::snapshot::DirectorySnapshot;

/// Knobs for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncOptions {
    /// Login of the authenticating identity.
    pub self_login: String,
    /// Target Directory project id.
    pub project_id: String,
    pub org_owned_project: bool,
    pub reinvite_allowed: bool,
    /// Classify and audit plans without executing them.
    pub dry_run: bool,
    /// Identifier stamped on every audit row and filter title.
    pub run_id: String,
}

/// Per-run counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub processed: usize,
    pub succeeded: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl RunSummary {
    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }
}

/// State built once at run start and read by every row.
#[derive(Debug, Clone)]
pub struct PreparedRun {
    pub catalog: AttributeCatalog,
    pub snapshot: DirectorySnapshot,
    pub roles: RoleMapping,
    pub context: ReconcileContext,
}

pub struct SyncRunner<'a> {
    directory: &'a dyn DirectoryService,
    provisioning: &'a dyn ProvisioningService,
    options: SyncOptions,
}

impl<'a> SyncRunner<'a> {
    pub fn new(
        directory: &'a dyn DirectoryService,
        provisioning: &'a dyn ProvisioningService,
        options: SyncOptions,
    ) -> Self {
        Self {
            directory,
            provisioning,
            options,
        }
    }

    fn bootstrap_entry(&self, step: AuditStep, details: impl Into<String>) -> AuditEntry {
        AuditEntry::new(
            BOOTSTRAP_LOGIN,
            step,
            true,
            "",
            details,
            "",
            self.options.run_id.clone(),
        )
    }

    /// Run the preflight checks and build the snapshot, catalog and role
    /// mapping. Any failure here aborts the run before a row is touched.
    pub async fn prepare(&self, sink: &mut dyn AuditSink) -> SyncResult<PreparedRun> {
        info!(
            project_id = %self.options.project_id,
            run_id = %self.options.run_id,
            "Preparing run"
        );
        preflight::check_project_ownership(self.provisioning, &self.options.project_id).await?;

        info!("Obtaining all attributes for the project");
        let attributes = self
            .directory
            .list_attributes()
            .await
            .map_err(|e| SyncError::remote("list attributes", e))?;
        let catalog = AttributeCatalog::from_entries(attributes);
        sink.record(self.bootstrap_entry(AuditStep::GetAttributes, catalog.len().to_string()))?;

        let snapshot = DirectorySnapshot::load(self.directory, self.provisioning).await?;
        sink.record(self.bootstrap_entry(
            AuditStep::GetDirectoryUsers,
            snapshot.project_user_count().to_string(),
        ))?;
        sink.record(self.bootstrap_entry(
            AuditStep::GetOrgUsers,
            snapshot.org_user_count().to_string(),
        ))?;
        sink.record(self.bootstrap_entry(
            AuditStep::GetInvitations,
            snapshot.invited_count().to_string(),
        ))?;

        let roles = RoleMapping::load(self.directory).await?;
        sink.record(self.bootstrap_entry(AuditStep::MapRoles, roles.to_json().to_string()))?;

        preflight::check_administrator(self.directory, &snapshot, &roles, &self.options.self_login)
            .await?;

        let context = ReconcileContext::new(
            &self.options.self_login,
            self.options.org_owned_project,
            self.options.reinvite_allowed,
        );

        Ok(PreparedRun {
            catalog,
            snapshot,
            roles,
            context,
        })
    }

    /// Process records in order, adding their outcomes to `summary`.
    ///
    /// Row failures are audited and counted; only an internal inconsistency
    /// or an audit sink failure returns an error.
    pub async fn process(
        &self,
        prepared: &PreparedRun,
        records: &[RosterRecord],
        sink: &mut dyn AuditSink,
        summary: &mut RunSummary,
    ) -> SyncResult<()> {
        let executor = ActionExecutor::new(
            self.directory,
            self.provisioning,
            &prepared.catalog,
            &prepared.roles,
            &self.options.run_id,
        );

        for record in records {
            summary.processed += 1;
            info!(login = %record.login, line = record.line_number, "Starting process for user");

            let row = match DesiredUserRow::from_record(record) {
                Ok(row) => row,
                Err(e) => {
                    let step = match e {
                        RowValidationError::InvalidRole { .. } => AuditStep::RoleError,
                        RowValidationError::InvalidAction { .. } => AuditStep::ActionError,
                    };
                    warn!(login = %record.login, error = %e, "Row failed validation");
                    sink.record(AuditEntry::new(
                        record.login.clone(),
                        step,
                        false,
                        record.role.clone(),
                        e.to_string(),
                        record.muf.clone(),
                        self.options.run_id.clone(),
                    ))?;
                    summary.failed += 1;
                    continue;
                }
            };

            let plan = classify(&row, &prepared.snapshot, &prepared.context)?;
            info!(login = %row.login, plan = %plan, "User was assigned plan");

            if self.options.dry_run && !plan.is_skip() {
                sink.record(AuditEntry::new(
                    row.login.clone(),
                    AuditStep::NoAction,
                    true,
                    row.role.to_string(),
                    format!("dry-run: {plan}"),
                    row.muf.clone(),
                    self.options.run_id.clone(),
                ))?;
                summary.skipped += 1;
                continue;
            }

            match executor.execute(&row, &plan, sink).await? {
                RowOutcome::Skipped => summary.skipped += 1,
                RowOutcome::Completed => summary.succeeded += 1,
                RowOutcome::Failed { .. } => summary.failed += 1,
            }
        }

        Ok(())
    }

    /// Prepare, then process every record.
    pub async fn run(
        &self,
        records: &[RosterRecord],
        sink: &mut dyn AuditSink,
    ) -> SyncResult<RunSummary> {
        let prepared = self.prepare(sink).await?;
        let mut summary = RunSummary::default();
        self.process(&prepared, records, sink, &mut summary).await?;

        info!(
            processed = summary.processed,
            succeeded = summary.succeeded,
            skipped = summary.skipped,
            failed = summary.failed,
            "Run finished"
        );
        Ok(summary)
    }
}
