//! UserService: the admin-API lifecycle of one gateway user.

use crate::{
    clients::RemoteClients,
    errors::{ReconcileError, ReconcileResult, StepContext, optional},
    models::{
        admin::UserSpec,
        mutability::{USER_FIELDS, validate_transition},
        user::{KeyRequest, User},
    },
};
use tracing::{debug, info};

#[derive(Clone)]
pub struct UserService {
    clients: RemoteClients,
}

fn user_spec(desired: &User, display_name: Option<String>, keys: KeyRequest) -> UserSpec {
    UserSpec {
        id: desired.id.clone(),
        display_name,
        max_buckets: desired.max_buckets,
        generate_key: keys.generate_key(),
        keys: keys.into_keys(),
    }
}

impl UserService {
    pub fn new(clients: RemoteClients) -> Self {
        Self { clients }
    }

    /// Create the user. The display name defaults to the id, and keys are
    /// generated by the gateway unless a pair is declared.
    pub async fn create(&self, desired: &User) -> ReconcileResult<User> {
        if desired.id.is_empty() {
            return Err(ReconcileError::InvalidInput("user id must not be empty".into()));
        }
        let keys = desired.create_key_request()?;
        let display_name = desired.name.clone().unwrap_or_else(|| desired.id.clone());
        let spec = user_spec(desired, Some(display_name), keys);

        debug!(user = %spec.id, generate_key = spec.generate_key, "creating user");
        let info = self
            .clients
            .admin
            .create_user(&spec)
            .await
            .step("CreateUser")?;

        info!(user = %spec.id, "user created");
        Ok(User::from_admin(&info))
    }

    /// Current remote record, or `None` when the user is gone.
    pub async fn read(&self, id: &str) -> ReconcileResult<Option<User>> {
        let info = optional(self.clients.admin.get_user(id).await).step("GetUser")?;
        if info.is_none() {
            debug!(user = id, "user not found, dropping from state");
        }
        Ok(info.as_ref().map(User::from_admin))
    }

    /// Converge a tracked user onto `desired`.
    ///
    /// The tracked access key is revoked before the modification is sent, so
    /// the user holds no valid key until `ModifyUser` succeeds.
    pub async fn update(&self, state: &User, desired: &User) -> ReconcileResult<User> {
        validate_transition("user", USER_FIELDS, state, desired)?;
        let keys = desired.update_key_request(state)?;
        let spec = user_spec(desired, desired.name.clone(), keys);
        let admin = &self.clients.admin;

        if let Some(access_key) = state.access_key.as_deref().filter(|k| !k.is_empty()) {
            debug!(user = %state.id, "revoking tracked access key");
            admin
                .remove_key(&state.id, access_key)
                .await
                .step("RemoveKey")?;
        }

        let info = admin.modify_user(&spec).await.step("ModifyUser")?;
        info!(user = %spec.id, regenerated = spec.generate_key, "user updated");
        Ok(User::from_admin(&info))
    }

    /// Replace the tracked key pair with a freshly generated one.
    pub async fn rotate_keys(&self, state: &User) -> ReconcileResult<User> {
        let desired = User {
            access_key: None,
            secret_key: None,
            ..state.clone()
        };
        self.update(state, &desired).await
    }

    pub async fn delete(&self, id: &str) -> ReconcileResult<()> {
        self.clients
            .admin
            .remove_user(id)
            .await
            .step("RemoveUser")?;
        info!(user = id, "user deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        clients::fake::FakeGateway,
        models::admin::{UserInfo, UserKey},
    };
    use std::sync::Arc;

    fn service() -> (Arc<FakeGateway>, UserService) {
        let gateway = FakeGateway::new();
        let service = UserService::new(gateway.clients());
        (gateway, service)
    }

    fn with_keys(id: &str, access: &str, secret: &str) -> User {
        User {
            id: id.into(),
            access_key: Some(access.into()),
            secret_key: Some(secret.into()),
            ..User::default()
        }
    }

    #[tokio::test]
    async fn bob_is_named_after_the_id_and_gets_generated_keys() {
        let (_, service) = service();

        let bob = service
            .create(&User {
                id: "bob".into(),
                ..User::default()
            })
            .await
            .unwrap();

        assert_eq!(bob.name.as_deref(), Some("bob"));
        assert!(!bob.access_key.unwrap_or_default().is_empty());
        assert!(!bob.secret_key.unwrap_or_default().is_empty());
    }

    #[tokio::test]
    async fn create_passes_explicit_pair_through() {
        let (gateway, service) = service();

        let carol = service
            .create(&User {
                name: Some("Carol".into()),
                max_buckets: Some(5),
                ..with_keys("carol", "CAROLKEY", "carol-secret")
            })
            .await
            .unwrap();

        assert_eq!(carol.access_key.as_deref(), Some("CAROLKEY"));
        assert_eq!(carol.max_buckets, Some(5));
        assert_eq!(gateway.user("carol").unwrap().keys.len(), 1);
    }

    #[tokio::test]
    async fn create_rejects_half_a_pair_without_remote_calls() {
        let (gateway, service) = service();

        let err = service
            .create(&User {
                id: "dave".into(),
                access_key: Some("ONLYACCESS".into()),
                ..User::default()
            })
            .await
            .unwrap_err();

        assert!(matches!(err, ReconcileError::InvalidInput(_)));
        assert!(gateway.calls().is_empty());
    }

    #[tokio::test]
    async fn read_of_missing_user_drops_it() {
        let (_, service) = service();
        assert_eq!(service.read("nobody").await.unwrap(), None);
    }

    #[tokio::test]
    async fn update_regenerates_and_revokes_before_modify() {
        let (gateway, service) = service();
        gateway.seed_user(UserInfo {
            user_id: "erin".into(),
            display_name: "Erin".into(),
            max_buckets: Some(10),
            keys: vec![UserKey {
                user: "erin".into(),
                access_key: "ERINOLD".into(),
                secret_key: "erin-old".into(),
            }],
        });
        let state = with_keys("erin", "ERINOLD", "erin-old");
        let desired = User {
            id: "erin".into(),
            ..User::default()
        };

        let updated = service.update(&state, &desired).await.unwrap();

        assert_eq!(gateway.calls(), ["RemoveKey", "ModifyUser"]);
        let new_key = updated.access_key.unwrap();
        assert!(!new_key.is_empty());
        assert_ne!(new_key, "ERINOLD");
        let remote = gateway.user("erin").unwrap();
        assert_eq!(remote.keys.len(), 1);
        assert_eq!(remote.display_name, "Erin");
    }

    #[tokio::test]
    async fn update_rejects_id_change_without_remote_calls() {
        let (gateway, service) = service();
        let state = with_keys("frank", "AK", "SK");
        let desired = User {
            id: "francis".into(),
            ..state.clone()
        };

        let err = service.update(&state, &desired).await.unwrap_err();

        assert!(matches!(err, ReconcileError::Immutable(ref e) if e.field == "id"));
        assert!(gateway.calls().is_empty());
    }

    #[tokio::test]
    async fn failed_modify_leaves_user_without_the_old_key() {
        let (gateway, service) = service();
        let grace = service
            .create(&with_keys("grace", "GRACEOLD", "grace-old"))
            .await
            .unwrap();
        gateway.fail_on("ModifyUser");

        let err = service.rotate_keys(&grace).await.unwrap_err();

        assert!(err.to_string().starts_with("ModifyUser failed"));
        assert!(gateway.user("grace").unwrap().keys.is_empty());
    }

    #[tokio::test]
    async fn rotate_keys_issues_a_fresh_pair_and_keeps_the_name() {
        let (_, service) = service();
        let heidi = service
            .create(&User {
                id: "heidi".into(),
                name: Some("Heidi".into()),
                ..User::default()
            })
            .await
            .unwrap();

        let rotated = service.rotate_keys(&heidi).await.unwrap();

        assert_eq!(rotated.name.as_deref(), Some("Heidi"));
        assert_ne!(rotated.access_key, heidi.access_key);
        assert_ne!(rotated.secret_key, heidi.secret_key);
    }

    #[tokio::test]
    async fn delete_is_a_single_admin_call() {
        let (gateway, service) = service();
        service
            .create(&User {
                id: "ivan".into(),
                ..User::default()
            })
            .await
            .unwrap();
        gateway.clear_calls();

        service.delete("ivan").await.unwrap();

        assert_eq!(gateway.calls(), ["RemoveUser"]);
        assert!(gateway.user("ivan").is_none());
    }
}
