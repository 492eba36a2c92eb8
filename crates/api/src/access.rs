//! Role resolution and gates.
//!
//! A caller's role for a group is derived per request from the verified
//! identity and the group's current roster: the owner is matched by user id,
//! participants by verified email, and managers by the matched participant's
//! flag. Gates are cumulative: the owner passes every gate, a manager
//! passes the participant gate.

use domain::group::Group;
use domain::participant::Participant;

use crate::error::ApiError;
use crate::identity::Identity;

/// The caller's standing with respect to one group.
#[derive(Debug, Clone)]
pub struct RoleContext {
    pub is_owner: bool,
    pub matched_participant: Option<Participant>,
}

impl RoleContext {
    /// Resolves the caller's role. `matched_participant` is the first roster
    /// entry whose email is one of the caller's verified emails.
    pub fn resolve(identity: &Identity, group: &Group, participants: &[Participant]) -> Self {
        let matched_participant = participants
            .iter()
            .find(|p| {
                p.email_id
                    .as_deref()
                    .is_some_and(|email| identity.has_verified_email(email))
            })
            .cloned();

        Self {
            is_owner: identity.user_id == group.owner_user_id,
            matched_participant,
        }
    }

    pub fn is_participant(&self) -> bool {
        self.is_owner || self.matched_participant.is_some()
    }

    pub fn is_manager(&self) -> bool {
        self.is_owner
            || self
                .matched_participant
                .as_ref()
                .is_some_and(|p| p.manager)
    }

    pub fn require_participant(&self) -> Result<(), ApiError> {
        if self.is_participant() {
            Ok(())
        } else {
            Err(ApiError::Forbidden(
                "You are not a participant of this group".to_string(),
            ))
        }
    }

    pub fn require_manager(&self) -> Result<(), ApiError> {
        if self.is_manager() {
            Ok(())
        } else {
            Err(ApiError::Forbidden(
                "Only a group manager may do this".to_string(),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn group(owner_user_id: Uuid) -> Group {
        Group {
            id: Uuid::new_v4(),
            name: "Squad".to_string(),
            created_at: Utc::now(),
            owner_user_id,
            owner_email: "owner@x".to_string(),
            owner_participant_id: Uuid::new_v4(),
        }
    }

    fn participant(email: Option<&str>, manager: bool) -> Participant {
        Participant {
            id: Uuid::new_v4(),
            name: format!("p-{}", Uuid::new_v4().simple()),
            active: true,
            email_id: email.map(str::to_string),
            manager,
            spins_since_last_won: 0,
        }
    }

    fn identity(user_id: Uuid, emails: &[&str]) -> Identity {
        Identity {
            user_id,
            verified_emails: emails.iter().map(|e| e.to_string()).collect(),
            primary_email: emails.first().unwrap_or(&"").to_string(),
            display_name: "T".to_string(),
        }
    }

    #[test]
    fn test_owner_passes_every_gate() {
        let user_id = Uuid::new_v4();
        let group = group(user_id);
        let role = RoleContext::resolve(&identity(user_id, &[]), &group, &[]);

        assert!(role.is_owner);
        assert!(role.is_manager());
        assert!(role.is_participant());
        assert!(role.require_manager().is_ok());
    }

    #[test]
    fn test_email_match_is_case_insensitive() {
        let group = group(Uuid::new_v4());
        let roster = vec![participant(Some("ada@x"), false)];
        let role = RoleContext::resolve(&identity(Uuid::new_v4(), &["ADA@X"]), &group, &roster);

        assert!(!role.is_owner);
        assert!(role.is_participant());
        assert!(!role.is_manager());
        assert!(role.require_participant().is_ok());
        assert!(role.require_manager().is_err());
    }

    #[test]
    fn test_manager_flag_comes_from_matched_participant() {
        let group = group(Uuid::new_v4());
        let roster = vec![
            participant(Some("other@x"), true),
            participant(Some("ada@x"), true),
        ];
        let role = RoleContext::resolve(&identity(Uuid::new_v4(), &["ada@x"]), &group, &roster);
        assert!(role.is_manager());
    }

    #[test]
    fn test_outsider_fails_gates() {
        let group = group(Uuid::new_v4());
        let roster = vec![participant(Some("ada@x"), true)];
        let role = RoleContext::resolve(&identity(Uuid::new_v4(), &["ben@x"]), &group, &roster);

        assert!(!role.is_participant());
        assert!(role.require_participant().is_err());
        assert!(role.require_manager().is_err());
    }

    #[test]
    fn test_participants_without_email_never_match() {
        let group = group(Uuid::new_v4());
        let roster = vec![participant(None, false)];
        let role = RoleContext::resolve(&identity(Uuid::new_v4(), &["ada@x"]), &group, &roster);
        assert!(role.matched_participant.is_none());
    }
}
