use rorm::fields::types::ForeignModel;
use rorm::{DbEnum, Model, Patch};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::{Account, Game};

/// The lifecycle state shared by [UserInvite] and [InviteLink].
///
/// `Pending` is the initial state and the only one from which transitions
/// are allowed. User invites move to `Accepted`, `Declined` or `Deleted`,
/// invite links to `Used` or `Deleted`. There are no reverse transitions.
#[derive(DbEnum, Serialize, Deserialize, ToSchema, Copy, Clone, Debug, Eq, PartialEq)]
pub enum InviteStatus {
    /// Initial state, the invite can still be redeemed
    Pending,
    /// A user invite that has been accepted by the invitee
    Accepted,
    /// A user invite that has been declined by the invitee
    Declined,
    /// A single-use invite link that has been redeemed
    Used,
    /// The invite was cancelled by the game admin
    Deleted,
}

/// How often an [InviteLink] may be redeemed.
///
/// `Unlimited` links never change their usage. A `SingleUse` link becomes
/// `Redeemed` the moment it is accepted and is dead from then on.
#[derive(DbEnum, Serialize, Deserialize, ToSchema, Copy, Clone, Debug, Eq, PartialEq)]
pub enum LinkUsage {
    /// The link may be redeemed by any number of users
    Unlimited,
    /// The link may be redeemed once and hasn't been yet
    SingleUse,
    /// The link was single-use and has been redeemed
    Redeemed,
}

/// An invitation of a specific user into a game.
#[derive(Model)]
pub struct UserInvite {
    /// Primary key of the invite
    #[rorm(primary_key)]
    pub uuid: Uuid,

    /// The game the invite grants access to
    #[rorm(on_delete = "Cascade", on_update = "Cascade")]
    pub game: ForeignModel<Game>,

    /// The invited user
    #[rorm(on_delete = "Cascade", on_update = "Cascade")]
    pub invited_user: ForeignModel<Account>,

    /// The user that has created the invite
    #[rorm(on_delete = "Cascade", on_update = "Cascade")]
    pub invited_by: ForeignModel<Account>,

    /// Optional message shown to the invitee
    #[rorm(max_length = 65535)]
    pub message: Option<String>,

    /// The current lifecycle state
    pub status: InviteStatus,

    /// If set, the invite can not be redeemed after this point in time
    pub expires_at: Option<chrono::NaiveDateTime>,

    /// The user that accepted the invite
    pub accepted_by: Option<ForeignModel<Account>>,

    /// The point in time the invite was accepted
    pub accepted_at: Option<chrono::NaiveDateTime>,

    /// The point in time the invite was created
    #[rorm(auto_create_time)]
    pub created_at: chrono::NaiveDateTime,
}

#[derive(Patch)]
#[rorm(model = "UserInvite")]
pub(crate) struct UserInviteInsert {
    pub(crate) uuid: Uuid,
    pub(crate) game: ForeignModel<Game>,
    pub(crate) invited_user: ForeignModel<Account>,
    pub(crate) invited_by: ForeignModel<Account>,
    pub(crate) message: Option<String>,
    pub(crate) status: InviteStatus,
    pub(crate) expires_at: Option<chrono::NaiveDateTime>,
    pub(crate) accepted_by: Option<ForeignModel<Account>>,
    pub(crate) accepted_at: Option<chrono::NaiveDateTime>,
}

/// A bearer-token invitation into a game, usable by whoever presents the code.
#[derive(Model)]
pub struct InviteLink {
    /// Primary key of the invite link
    #[rorm(primary_key)]
    pub uuid: Uuid,

    /// The game the link grants access to
    #[rorm(on_delete = "Cascade", on_update = "Cascade")]
    pub game: ForeignModel<Game>,

    /// The random token that is handed out to users
    #[rorm(max_length = 64, unique)]
    pub invite_code: String,

    /// The user that has created the link
    #[rorm(on_delete = "Cascade", on_update = "Cascade")]
    pub invited_by: ForeignModel<Account>,

    /// Optional message shown when the link is opened
    #[rorm(max_length = 65535)]
    pub message: Option<String>,

    /// Whether the link is single-use, and if so, whether it was redeemed yet
    pub usage: LinkUsage,

    /// The current lifecycle state
    pub status: InviteStatus,

    /// If set, the link can not be redeemed after this point in time
    pub expires_at: Option<chrono::NaiveDateTime>,

    /// The user that redeemed the link most recently
    pub used_by: Option<ForeignModel<Account>>,

    /// The point in time the link was redeemed most recently
    pub used_at: Option<chrono::NaiveDateTime>,

    /// The point in time the link was created
    #[rorm(auto_create_time)]
    pub created_at: chrono::NaiveDateTime,
}

#[derive(Patch)]
#[rorm(model = "InviteLink")]
pub(crate) struct InviteLinkInsert {
    pub(crate) uuid: Uuid,
    pub(crate) game: ForeignModel<Game>,
    pub(crate) invite_code: String,
    pub(crate) invited_by: ForeignModel<Account>,
    pub(crate) message: Option<String>,
    pub(crate) usage: LinkUsage,
    pub(crate) status: InviteStatus,
    pub(crate) expires_at: Option<chrono::NaiveDateTime>,
    pub(crate) used_by: Option<ForeignModel<Account>>,
    pub(crate) used_at: Option<chrono::NaiveDateTime>,
}

/// The reason an invite can not be redeemed right now.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum RedeemError {
    /// The invite has left the `Pending` state
    NotPending(InviteStatus),
    /// The invite carried an expiry time which has passed
    Expired,
    /// The target game has already ended
    GameEnded,
}

/// Check whether an invite or invite link may still be redeemed.
///
/// The checks are ordered: a cancelled invite reports `NotPending` even
/// if it would also be expired. Membership of the caller has to be
/// checked separately since it is not a property of the invite itself.
pub fn check_redeemable(
    status: InviteStatus,
    expires_at: Option<chrono::NaiveDateTime>,
    game_ending_time: chrono::NaiveDateTime,
    now: chrono::NaiveDateTime,
) -> Result<(), RedeemError> {
    if status != InviteStatus::Pending {
        return Err(RedeemError::NotPending(status));
    }

    if let Some(expires_at) = expires_at {
        if now > expires_at {
            return Err(RedeemError::Expired);
        }
    }

    if now > game_ending_time {
        return Err(RedeemError::GameEnded);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, NaiveDate, NaiveDateTime};

    use super::*;

    fn t(minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 6, 1)
            .unwrap()
            .and_hms_opt(12, minute, 0)
            .unwrap()
    }

    #[test]
    fn pending_unexpired_invite_is_redeemable() {
        let now = t(0);
        let ending = now + Duration::hours(1);
        assert_eq!(
            check_redeemable(InviteStatus::Pending, None, ending, now),
            Ok(())
        );
        assert_eq!(
            check_redeemable(InviteStatus::Pending, Some(t(30)), ending, now),
            Ok(())
        );
    }

    #[test]
    fn terminal_states_are_not_redeemable() {
        let now = t(0);
        let ending = now + Duration::hours(1);
        for status in [
            InviteStatus::Accepted,
            InviteStatus::Declined,
            InviteStatus::Used,
            InviteStatus::Deleted,
        ] {
            assert_eq!(
                check_redeemable(status, None, ending, now),
                Err(RedeemError::NotPending(status))
            );
        }
    }

    #[test]
    fn expired_invite_is_rejected() {
        let now = t(30);
        let ending = now + Duration::hours(1);
        assert_eq!(
            check_redeemable(InviteStatus::Pending, Some(t(10)), ending, now),
            Err(RedeemError::Expired)
        );
    }

    #[test]
    fn expiry_exactly_now_is_still_valid() {
        let now = t(30);
        let ending = now + Duration::hours(1);
        assert_eq!(
            check_redeemable(InviteStatus::Pending, Some(now), ending, now),
            Ok(())
        );
    }

    #[test]
    fn ended_game_is_rejected() {
        let now = t(30);
        assert_eq!(
            check_redeemable(InviteStatus::Pending, None, t(10), now),
            Err(RedeemError::GameEnded)
        );
    }

    #[test]
    fn non_pending_wins_over_expiry() {
        // a deleted invite that is also expired reports the state, not the expiry
        let now = t(30);
        assert_eq!(
            check_redeemable(InviteStatus::Deleted, Some(t(10)), t(20), now),
            Err(RedeemError::NotPending(InviteStatus::Deleted))
        );
    }
}
