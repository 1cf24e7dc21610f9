pub mod delete_task;
pub mod secret_key;
pub mod url;
pub mod user;

pub use delete_task::Entity as DeleteTaskEntity;
pub use secret_key::Entity as SecretKeyEntity;
pub use url::Entity as UrlEntity;
pub use user::Entity as UserEntity;
