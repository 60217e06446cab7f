use crate::{
    config::AdminSeed,
    error::{AppError, Result},
    models::{NewUser, User},
    password::hash_password,
    repository::RepositoryState,
};

/// seed_admin
///
/// Creates the bootstrap administrator unless a user with that username already exists.
/// Returns the created user, or `None` when nothing was created. Running it on every
/// startup is safe: a concurrent instance winning the insert race is treated the same
/// as the user already existing. If another account already holds the seed email the
/// seed is skipped with a warning rather than failing startup.
pub async fn seed_admin(repo: &RepositoryState, seed: &AdminSeed) -> Result<Option<User>> {
    if repo.username_exists(&seed.username).await? {
        tracing::debug!(username = %seed.username, "admin user already present");
        return Ok(None);
    }

    let hashed_password = hash_password(&seed.password)?;
    let created = repo
        .create_user(NewUser {
            username: seed.username.clone(),
            email: seed.email.clone(),
            hashed_password,
            is_admin: true,
        })
        .await;

    match created {
        Ok(user) => {
            tracing::info!(user_id = user.id, username = %user.username, "admin user created");
            Ok(Some(user))
        }
        Err(AppError::UsernameTaken) => Ok(None),
        Err(AppError::EmailTaken) => {
            tracing::warn!(
                username = %seed.username,
                email = %seed.email,
                "admin seed skipped: email already belongs to another user"
            );
            Ok(None)
        }
        Err(e) => Err(e),
    }
}
