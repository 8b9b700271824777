//! Transition table for the parcel lifecycle.
//!
//! Everything here is pure: callers load the parcel, ask whether the action is
//! legal from its current status, and only then build a commit.

use common::domain::{DomainError, DomainResult, ParcelStatus};

/// Handler and sender actions that move a parcel along its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleAction {
    Scan,
    HandOver,
    InitiateDelivery,
    VerifyDelivery,
    ReportTampering,
}

impl LifecycleAction {
    pub fn target(self) -> ParcelStatus {
        match self {
            LifecycleAction::Scan => ParcelStatus::Scanned,
            LifecycleAction::HandOver => ParcelStatus::HandedOver,
            LifecycleAction::InitiateDelivery => ParcelStatus::OutForDelivery,
            LifecycleAction::VerifyDelivery => ParcelStatus::Delivered,
            LifecycleAction::ReportTampering => ParcelStatus::Tampered,
        }
    }

    /// Statuses this action may start from, excluding the idempotent self-transition
    pub fn sources(self) -> &'static [ParcelStatus] {
        use ParcelStatus::*;
        match self {
            LifecycleAction::Scan => &[Created, HandedOver, InWarehouse, TamperResolved],
            LifecycleAction::HandOver => &[Scanned, InWarehouse],
            LifecycleAction::InitiateDelivery => &[Created, HandedOver, Scanned, InWarehouse],
            LifecycleAction::VerifyDelivery => &[OutForDelivery],
            LifecycleAction::ReportTampering => &[
                Created,
                Scanned,
                HandedOver,
                InWarehouse,
                OutForDelivery,
                ReturnedToSender,
                TamperResolved,
            ],
        }
    }

    pub fn is_allowed_from(self, current: ParcelStatus) -> bool {
        if current.is_terminal() {
            return false;
        }
        current == self.target() || self.sources().contains(&current)
    }
}

/// Resolve the status `action` leads to from `current`, or fail with `InvalidTransition`
pub fn check_transition(action: LifecycleAction, current: ParcelStatus) -> DomainResult<ParcelStatus> {
    let target = action.target();
    if action.is_allowed_from(current) {
        Ok(target)
    } else {
        Err(DomainError::InvalidTransition {
            from: current,
            to: target,
        })
    }
}

/// Guard for handler-driven status overrides.
///
/// Any non-terminal status may move to any status except the ones owned by
/// the tamper workflow, and a tampered parcel only leaves through a resolution.
/// Re-affirming the current status is always accepted.
pub fn check_manual_update(current: ParcelStatus, requested: ParcelStatus) -> DomainResult<()> {
    let rejected = DomainError::InvalidTransition {
        from: current,
        to: requested,
    };

    if current.is_terminal() {
        return Err(rejected);
    }
    if current == requested {
        return Ok(());
    }
    if current == ParcelStatus::Tampered || is_tamper_owned(requested) {
        return Err(rejected);
    }
    Ok(())
}

fn is_tamper_owned(status: ParcelStatus) -> bool {
    matches!(
        status,
        ParcelStatus::Tampered | ParcelStatus::TamperResolved | ParcelStatus::ReturnedDueToDamage
    )
}
