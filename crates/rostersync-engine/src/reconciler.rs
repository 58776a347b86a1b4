//! Membership reconciliation.
//!
//! Classifies each desired row against the start-of-run snapshot into a
//! closed [`ActionPlan`], which the executor interprets step by step.

use std::fmt;

use crate::error::{SyncError, SyncResult};
use crate::model::{normalize_login, DesiredUserRow, MemberStatus, RequestedAction};
use crate::snapshot::DirectorySnapshot;

/// Run-wide inputs to classification that do not come from the snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileContext {
    /// Normalized login of the authenticating identity.
    pub self_login: String,
    /// Whether logins absent everywhere may get an organization account.
    pub org_owned_project: bool,
    /// Whether logins with a pending invitation may be invited again.
    pub reinvite_allowed: bool,
}

impl ReconcileContext {
    pub fn new(self_login: &str, org_owned_project: bool, reinvite_allowed: bool) -> Self {
        Self {
            self_login: normalize_login(self_login),
            org_owned_project,
            reinvite_allowed,
        }
    }
}

/// How a `FilterThenEnable` plan grants access once filters are in place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnableTarget {
    /// Send a project invitation carrying the filters.
    Invite,
    /// Attach filters to the organization account and add it to the project.
    Organization { user_ref: String },
}

/// The remote work decided for one row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionPlan {
    Skip,
    /// Removal of the authenticating identity, refused.
    SkipNoRemove,
    Remove { user_ref: String },
    Disable { user_ref: String },
    DisableThenFilterThenEnable { user_ref: String },
    FilterThenEnable { target: EnableTarget },
    TryCreateThenFilterThenInviteOrEnable,
}

/// One remote operation within a plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    Disable { user_ref: String },
    Remove { user_ref: String },
    /// Compile the row's filter spec and create the filter objects.
    CompileFilters,
    /// Replace the user's filters with the ones just created.
    AttachFilters { user_ref: String },
    /// Set the project member to ENABLED with the requested role.
    EnableInProject { user_ref: String },
    /// Add the organization account to the project with the requested role.
    EnableInOrganization,
    Invite,
    CreateOrgAccount,
    /// Invite or enable, depending on whether account creation produced a
    /// reference and on the requested action.
    InviteOrEnable,
}

impl ActionPlan {
    /// Whether the plan issues no remote call at all.
    pub fn is_skip(&self) -> bool {
        matches!(self, ActionPlan::Skip | ActionPlan::SkipNoRemove)
    }

    /// Ordered steps of the plan. Empty for skips.
    pub fn steps(&self) -> Vec<Step> {
        match self {
            ActionPlan::Skip | ActionPlan::SkipNoRemove => Vec::new(),
            ActionPlan::Remove { user_ref } => vec![Step::Remove {
                user_ref: user_ref.clone(),
            }],
            ActionPlan::Disable { user_ref } => vec![Step::Disable {
                user_ref: user_ref.clone(),
            }],
            ActionPlan::DisableThenFilterThenEnable { user_ref } => vec![
                Step::Disable {
                    user_ref: user_ref.clone(),
                },
                Step::CompileFilters,
                Step::AttachFilters {
                    user_ref: user_ref.clone(),
                },
                Step::EnableInProject {
                    user_ref: user_ref.clone(),
                },
            ],
            ActionPlan::FilterThenEnable {
                target: EnableTarget::Invite,
            } => vec![Step::CompileFilters, Step::Invite],
            ActionPlan::FilterThenEnable {
                target: EnableTarget::Organization { user_ref },
            } => vec![
                Step::CompileFilters,
                Step::AttachFilters {
                    user_ref: user_ref.clone(),
                },
                Step::EnableInOrganization,
            ],
            ActionPlan::TryCreateThenFilterThenInviteOrEnable => vec![
                Step::CreateOrgAccount,
                Step::CompileFilters,
                Step::InviteOrEnable,
            ],
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ActionPlan::Skip => "Skip",
            ActionPlan::SkipNoRemove => "SkipNoRemove",
            ActionPlan::Remove { .. } => "Remove",
            ActionPlan::Disable { .. } => "Disable",
            ActionPlan::DisableThenFilterThenEnable { .. } => "DisableThenFilterThenEnable",
            ActionPlan::FilterThenEnable {
                target: EnableTarget::Invite,
            } => "FilterThenEnable(invite)",
            ActionPlan::FilterThenEnable {
                target: EnableTarget::Organization { .. },
            } => "FilterThenEnable(organization)",
            ActionPlan::TryCreateThenFilterThenInviteOrEnable => {
                "TryCreateThenFilterThenInviteOrEnable"
            }
        }
    }
}

impl fmt::Display for ActionPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Classify a validated row against the start-of-run snapshot.
///
/// Pure: identical inputs always yield the same plan. A member status outside
/// ENABLED/DISABLED is a gap in the membership matrix and aborts the run.
pub fn classify(
    row: &DesiredUserRow,
    snapshot: &DirectorySnapshot,
    ctx: &ReconcileContext,
) -> SyncResult<ActionPlan> {
    let login = normalize_login(&row.login);

    if login == ctx.self_login && row.action == RequestedAction::Remove {
        return Ok(ActionPlan::SkipNoRemove);
    }

    if row.action == RequestedAction::Invite
        && snapshot.is_invited(&login)
        && !ctx.reinvite_allowed
    {
        return Ok(ActionPlan::Skip);
    }

    if let Some(member) = snapshot.project_user(&login) {
        let user_ref = member.reference.clone();
        return match (&member.status, row.action) {
            (_, RequestedAction::Remove) => Ok(ActionPlan::Remove { user_ref }),
            (MemberStatus::Enabled, RequestedAction::Enable)
            | (MemberStatus::Disabled, RequestedAction::Enable)
            | (MemberStatus::Enabled, RequestedAction::Invite) => {
                Ok(ActionPlan::DisableThenFilterThenEnable { user_ref })
            }
            (MemberStatus::Enabled, RequestedAction::Disable) => {
                Ok(ActionPlan::Disable { user_ref })
            }
            (MemberStatus::Disabled, RequestedAction::Disable) => Ok(ActionPlan::Skip),
            (MemberStatus::Disabled, RequestedAction::Invite) => Ok(ActionPlan::FilterThenEnable {
                target: EnableTarget::Invite,
            }),
            (MemberStatus::Unrecognized(status), action) => {
                Err(SyncError::InternalInconsistency(format!(
                    "no plan for project member {login} with status {status} and action {action}"
                )))
            }
        };
    }

    if let Some(account) = snapshot.org_user(&login) {
        return Ok(match row.action {
            RequestedAction::Enable => ActionPlan::FilterThenEnable {
                target: EnableTarget::Organization {
                    user_ref: account.reference.clone(),
                },
            },
            RequestedAction::Invite => ActionPlan::FilterThenEnable {
                target: EnableTarget::Invite,
            },
            RequestedAction::Disable | RequestedAction::Remove => ActionPlan::Skip,
        });
    }

    Ok(match row.action {
        RequestedAction::Disable | RequestedAction::Remove => ActionPlan::Skip,
        RequestedAction::Enable | RequestedAction::Invite if ctx.org_owned_project => {
            ActionPlan::TryCreateThenFilterThenInviteOrEnable
        }
        RequestedAction::Enable | RequestedAction::Invite => ActionPlan::FilterThenEnable {
            target: EnableTarget::Invite,
        },
    })
}
