//! Plan interpreter.
//!
//! Runs the steps of one [`ActionPlan`] strictly in order and writes one audit
//! entry per executed step. The first failing step ends the row: nothing after
//! it runs and nothing before it is rolled back.

use tracing::{debug, info, warn};

use crate::audit::{AuditEntry, AuditError, AuditSink, AuditStep};
use crate::error::SyncResult;
use crate::model::{DesiredUserRow, MemberStatus, RequestedAction};
use crate::muf::{self, AttributeCatalog, MufSpec, ValueResolver};
use crate::reconciler::{ActionPlan, Step};
use crate::roles::RoleMapping;
use crate::services::{CreateOrgUserOutcome, DirectoryService, NewOrgUser, ProvisioningService};

/// How a row ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowOutcome {
    /// The plan had no remote work.
    Skipped,
    /// Every step succeeded.
    Completed,
    /// `step` failed; later steps were not attempted.
    Failed { step: AuditStep, message: String },
}

impl RowOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, RowOutcome::Failed { .. })
    }
}

enum StepError {
    Failed { step: AuditStep, message: String },
    Sink(AuditError),
}

impl From<AuditError> for StepError {
    fn from(e: AuditError) -> Self {
        StepError::Sink(e)
    }
}

fn failed(step: AuditStep, message: impl Into<String>) -> StepError {
    StepError::Failed {
        step,
        message: message.into(),
    }
}

/// Mutable state threaded through the steps of one row.
#[derive(Default)]
struct RowState {
    /// Account reference learned during the row (account creation).
    user_ref: Option<String>,
    /// URIs of the filters materialized for the row.
    filters: Vec<String>,
}

/// Audit writer bound to one row.
struct RowAudit<'s> {
    sink: &'s mut dyn AuditSink,
    login: String,
    role: String,
    muf: String,
    run_id: String,
}

impl RowAudit<'_> {
    fn write(&mut self, step: AuditStep, success: bool, details: &str) -> Result<(), AuditError> {
        self.sink.record(AuditEntry::new(
            self.login.clone(),
            step,
            success,
            self.role.clone(),
            details,
            self.muf.clone(),
            self.run_id.clone(),
        ))
    }

    fn success(&mut self, step: AuditStep, details: &str) -> Result<(), AuditError> {
        self.write(step, true, details)
    }

    fn failure(&mut self, step: AuditStep, details: &str) -> Result<(), AuditError> {
        self.write(step, false, details)
    }
}

/// Executes plans against the two remote services.
pub struct ActionExecutor<'a> {
    directory: &'a dyn DirectoryService,
    provisioning: &'a dyn ProvisioningService,
    catalog: &'a AttributeCatalog,
    roles: &'a RoleMapping,
    run_id: &'a str,
}

impl<'a> ActionExecutor<'a> {
    pub fn new(
        directory: &'a dyn DirectoryService,
        provisioning: &'a dyn ProvisioningService,
        catalog: &'a AttributeCatalog,
        roles: &'a RoleMapping,
        run_id: &'a str,
    ) -> Self {
        Self {
            directory,
            provisioning,
            catalog,
            roles,
            run_id,
        }
    }

    /// Execute `plan` for `row`.
    ///
    /// Step failures are reported through the returned [`RowOutcome`]; only an
    /// audit sink failure is an error.
    pub async fn execute(
        &self,
        row: &DesiredUserRow,
        plan: &ActionPlan,
        sink: &mut dyn AuditSink,
    ) -> SyncResult<RowOutcome> {
        let mut audit = RowAudit {
            sink,
            login: row.login.clone(),
            role: row.role.to_string(),
            muf: row.muf.clone(),
            run_id: self.run_id.to_string(),
        };

        match plan {
            ActionPlan::Skip => {
                audit.success(AuditStep::NoAction, "No action needed.")?;
                return Ok(RowOutcome::Skipped);
            }
            ActionPlan::SkipNoRemove => {
                warn!(login = %row.login, "Refusing to remove the authenticating user");
                audit.success(
                    AuditStep::NoAction,
                    "The authenticating user cannot be removed.",
                )?;
                return Ok(RowOutcome::Skipped);
            }
            _ => {}
        }

        let mut state = RowState::default();
        for step in plan.steps() {
            debug!(login = %row.login, step = ?step, "Executing step");
            match self.run_step(&step, row, &mut state, &mut audit).await {
                Ok(()) => {}
                Err(StepError::Failed { step, message }) => {
                    audit.failure(step, &message)?;
                    warn!(
                        login = %row.login,
                        step = %step,
                        error = %message,
                        "There were some errors for user"
                    );
                    return Ok(RowOutcome::Failed { step, message });
                }
                Err(StepError::Sink(e)) => return Err(e.into()),
            }
        }

        info!(login = %row.login, plan = %plan, "Process for user has ended");
        Ok(RowOutcome::Completed)
    }

    async fn run_step(
        &self,
        step: &Step,
        row: &DesiredUserRow,
        state: &mut RowState,
        audit: &mut RowAudit<'_>,
    ) -> Result<(), StepError> {
        match step {
            Step::Disable { user_ref } => self.disable(user_ref, audit).await,
            Step::Remove { user_ref } => {
                self.directory
                    .remove_user(user_ref)
                    .await
                    .map_err(|e| failed(AuditStep::Remove, e.to_string()))?;
                audit.success(AuditStep::Remove, "")?;
                Ok(())
            }
            Step::CompileFilters => self.compile_filters(row, state, audit).await,
            Step::AttachFilters { user_ref } => self.attach_filters(user_ref, state, audit).await,
            Step::EnableInProject { user_ref } => self.enable_in_project(user_ref, row, audit).await,
            Step::EnableInOrganization => self.enable_in_organization(row, audit).await,
            Step::Invite => self.invite(row, state, audit).await,
            Step::CreateOrgAccount => self.create_org_account(row, state, audit).await,
            Step::InviteOrEnable => match state.user_ref.clone() {
                Some(user_ref) if row.action != RequestedAction::Invite => {
                    self.attach_filters(&user_ref, state, audit).await?;
                    self.enable_in_organization(row, audit).await
                }
                _ => self.invite(row, state, audit).await,
            },
        }
    }

    async fn disable(&self, user_ref: &str, audit: &mut RowAudit<'_>) -> Result<(), StepError> {
        self.directory
            .set_user_status(user_ref, MemberStatus::Disabled, None)
            .await
            .map_err(|e| failed(AuditStep::Disable, e.to_string()))?;
        audit.success(AuditStep::Disable, "")?;
        Ok(())
    }

    async fn compile_filters(
        &self,
        row: &DesiredUserRow,
        state: &mut RowState,
        audit: &mut RowAudit<'_>,
    ) -> Result<(), StepError> {
        let spec = MufSpec::parse(&row.muf)
            .map_err(|e| failed(AuditStep::CreateMufExpr, e.to_string()))?;
        if spec.is_empty() {
            state.filters.clear();
            return Ok(());
        }

        let mut resolver = ValueResolver::new(self.directory);
        let compiled = muf::compile(&spec, self.catalog, &mut resolver)
            .await
            .map_err(|e| failed(AuditStep::CreateMufExpr, e.to_string()))?;
        let expressions: Vec<String> = compiled.iter().map(|c| c.to_expression()).collect();
        debug!(login = %row.login, expressions = ?expressions, "MUF expressions");
        audit.success(
            AuditStep::CreateMufExpr,
            &serde_json::Value::from(expressions).to_string(),
        )?;

        let uris = muf::materialize(&compiled, &row.login, self.run_id, self.directory)
            .await
            .map_err(|e| failed(AuditStep::CreateMuf, e.to_string()))?;
        audit.success(
            AuditStep::CreateMuf,
            &serde_json::Value::from(uris.clone()).to_string(),
        )?;

        state.filters = uris;
        Ok(())
    }

    async fn attach_filters(
        &self,
        user_ref: &str,
        state: &RowState,
        audit: &mut RowAudit<'_>,
    ) -> Result<(), StepError> {
        self.directory
            .attach_filters(user_ref, &state.filters)
            .await
            .map_err(|e| failed(AuditStep::AssignMuf, e.to_string()))?;
        audit.success(AuditStep::AssignMuf, "")?;
        Ok(())
    }

    fn role_reference(&self, row: &DesiredUserRow, step: AuditStep) -> Result<&str, StepError> {
        self.roles.reference(row.role).ok_or_else(|| {
            failed(
                step,
                format!(
                    "Role {} ({}) is not defined in the project.",
                    row.role,
                    row.role.directory_identifier()
                ),
            )
        })
    }

    async fn enable_in_project(
        &self,
        user_ref: &str,
        row: &DesiredUserRow,
        audit: &mut RowAudit<'_>,
    ) -> Result<(), StepError> {
        let role_ref = self.role_reference(row, AuditStep::Enable)?;
        self.directory
            .set_user_status(user_ref, MemberStatus::Enabled, Some(role_ref))
            .await
            .map_err(|e| failed(AuditStep::Enable, e.to_string()))?;
        audit.success(AuditStep::Enable, "")?;
        Ok(())
    }

    async fn enable_in_organization(
        &self,
        row: &DesiredUserRow,
        audit: &mut RowAudit<'_>,
    ) -> Result<(), StepError> {
        self.provisioning
            .add_user_to_project(&row.login, row.role)
            .await
            .map_err(|e| failed(AuditStep::Enable, e.to_string()))?;
        audit.success(AuditStep::Enable, "")?;
        Ok(())
    }

    async fn invite(
        &self,
        row: &DesiredUserRow,
        state: &RowState,
        audit: &mut RowAudit<'_>,
    ) -> Result<(), StepError> {
        let role_ref = self.role_reference(row, AuditStep::Invite)?;
        let outcome = self
            .directory
            .create_invitation(&row.login, role_ref, &state.filters)
            .await
            .map_err(|e| failed(AuditStep::Invite, e.to_string()))?;

        if !outcome.is_clean() {
            let details = serde_json::json!({
                "loginsDomainMismatch": outcome.logins_domain_mismatch,
                "loginsAlreadyInProject": outcome.logins_already_in_project,
            });
            return Err(failed(AuditStep::Invite, details.to_string()));
        }

        audit.success(AuditStep::Invite, "")?;
        Ok(())
    }

    async fn create_org_account(
        &self,
        row: &DesiredUserRow,
        state: &mut RowState,
        audit: &mut RowAudit<'_>,
    ) -> Result<(), StepError> {
        info!(login = %row.login, "Attempting to create user in organization");
        let request = NewOrgUser {
            login: row.login.clone(),
            first_name: row.first_name.clone(),
            last_name: row.last_name.clone(),
            sso_provider: row.sso_provider.clone(),
        };

        let outcome = self
            .provisioning
            .create_org_user(&request)
            .await
            .map_err(|e| failed(AuditStep::UserCreate, e.to_string()))?;

        match outcome {
            CreateOrgUserOutcome::Created { reference } => {
                debug!(login = %row.login, reference = %reference, "User created");
                audit.success(AuditStep::UserCreate, &reference)?;
                state.user_ref = Some(reference);
                Ok(())
            }
            CreateOrgUserOutcome::Rejected { message } => {
                Err(failed(AuditStep::UserCreate, message))
            }
            CreateOrgUserOutcome::ExistsElsewhere { message } => {
                warn!(
                    login = %row.login,
                    detail = %message,
                    "User already exists in a different organization"
                );
                audit.success(
                    AuditStep::UserCreate,
                    "User already exists in a different organization.",
                )?;
                Ok(())
            }
        }
    }
}
