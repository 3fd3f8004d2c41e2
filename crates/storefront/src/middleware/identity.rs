//! Request identity: who owns the cart this request works on.
//!
//! A signed-in user is recorded in the session under `current_user` by the
//! authentication subsystem (through [`complete_login`]). Everyone else is a
//! guest identified by a random key minted into the session on first use.

use axum::{extract::FromRequestParts, http::request::Parts};
use tower_sessions::Session;

use storefront_core::{CartOwner, GuestKey, UserId};

use crate::error::{AppError, clear_sentry_user, set_sentry_user};
use crate::models::{CurrentUser, session_keys};
use crate::services::cart::MergeReport;
use crate::state::AppState;

/// Resolve the cart owner for a session, minting a guest key if needed.
///
/// # Errors
///
/// Returns `AppError::Session` if the session store fails.
pub async fn resolve(session: &Session) -> Result<CartOwner, AppError> {
    if let Some(user) = session
        .get::<CurrentUser>(session_keys::CURRENT_USER)
        .await?
    {
        return Ok(CartOwner::user(user.id));
    }

    let key = match session.get::<GuestKey>(session_keys::GUEST_CART_KEY).await? {
        Some(key) => key,
        None => {
            let key = GuestKey::generate();
            session.insert(session_keys::GUEST_CART_KEY, key).await?;
            key
        }
    };
    Ok(CartOwner::guest(key))
}

fn session_from(parts: &Parts) -> Result<Session, AppError> {
    parts
        .extensions
        .get::<Session>()
        .cloned()
        .ok_or_else(|| AppError::Internal("session layer not installed".to_string()))
}

/// Extractor for the cart owner of the current request.
///
/// # Example
///
/// ```rust,ignore
/// async fn handler(CurrentIdentity(owner): CurrentIdentity) -> impl IntoResponse {
///     match owner {
///         CartOwner::User { user_id } => format!("user {user_id}"),
///         CartOwner::Guest { .. } => "guest".to_string(),
///     }
/// }
/// ```
#[derive(Debug, Clone, Copy)]
pub struct CurrentIdentity(pub CartOwner);

impl<S> FromRequestParts<S> for CurrentIdentity
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let session = session_from(parts)?;
        Ok(Self(resolve(&session).await?))
    }
}

/// Extractor that requires a signed-in user. Guests get 401.
#[derive(Debug, Clone, Copy)]
pub struct RequireUser(pub UserId);

impl<S> FromRequestParts<S> for RequireUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let session = session_from(parts)?;
        session
            .get::<CurrentUser>(session_keys::CURRENT_USER)
            .await?
            .map(|user| Self(user.id))
            .ok_or_else(|| AppError::Unauthorized("Sign in required".to_string()))
    }
}

/// Record a successful login and fold the guest cart into the user's cart.
///
/// The guest key is taken out of the session before merging, so a replayed
/// or concurrent login for the same session finds nothing left to merge.
///
/// # Errors
///
/// Returns an error if the session store fails or the guest cart cannot be
/// read. The user is signed in either way.
pub async fn complete_login(
    state: &AppState,
    session: &Session,
    user: CurrentUser,
) -> Result<MergeReport, AppError> {
    session.insert(session_keys::CURRENT_USER, user).await?;
    session.cycle_id().await?;
    set_sentry_user(&user.id);

    let guest = session
        .remove::<GuestKey>(session_keys::GUEST_CART_KEY)
        .await?;
    let Some(guest) = guest else {
        return Ok(MergeReport::default());
    };

    let report = state.carts().merge(guest, user.id).await?;
    tracing::info!(
        user_id = %user.id,
        merged = report.merged.len(),
        skipped = report.skipped.len(),
        "Guest cart merged at login"
    );
    Ok(report)
}

/// Sign the user out. The next request starts a fresh guest cart.
///
/// # Errors
///
/// Returns `AppError::Session` if the session store fails.
pub async fn complete_logout(session: &Session) -> Result<(), AppError> {
    session
        .remove::<CurrentUser>(session_keys::CURRENT_USER)
        .await?;
    session
        .remove::<GuestKey>(session_keys::GUEST_CART_KEY)
        .await?;
    session.cycle_id().await?;
    clear_sentry_user();
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use chrono::Utc;
    use rust_decimal_macros::dec;
    use storefront_core::{CategoryId, Product, ProductId};
    use tower_sessions::MemoryStore;

    use super::*;
    use crate::config::StorefrontConfig;
    use crate::db::MemoryCatalog;
    use crate::state::Stores;

    fn session() -> Session {
        Session::new(None, Arc::new(MemoryStore::default()), None)
    }

    async fn state() -> AppState {
        let catalog = Arc::new(MemoryCatalog::new());
        catalog
            .insert_product(Product {
                id: ProductId::new(1),
                name: "Mug".to_string(),
                price: dec!(10.00),
                stock_quantity: 50,
                min_stock_threshold: 5,
                category_id: Some(CategoryId::new(1)),
                active: true,
                promotions: Vec::new(),
            })
            .await;
        AppState::new(StorefrontConfig::default(), Stores::in_memory(catalog))
    }

    #[tokio::test]
    async fn test_guest_key_is_stable_within_session() {
        let session = session();
        let first = resolve(&session).await.unwrap();
        let second = resolve(&session).await.unwrap();
        assert!(first.is_guest());
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_user_wins_over_guest_key() {
        let session = session();
        resolve(&session).await.unwrap();
        session
            .insert(session_keys::CURRENT_USER, CurrentUser { id: UserId::new(4) })
            .await
            .unwrap();
        assert_eq!(
            resolve(&session).await.unwrap(),
            CartOwner::user(UserId::new(4))
        );
    }

    #[tokio::test]
    async fn test_login_merges_guest_cart_once() {
        let state = state().await;
        let session = session();
        let now = Utc::now();
        let user = CurrentUser { id: UserId::new(9) };

        let guest = resolve(&session).await.unwrap();
        state.carts().add_item(&guest, ProductId::new(1), 2, now).await.unwrap();
        state
            .carts()
            .add_item(&CartOwner::user(user.id), ProductId::new(1), 1, now)
            .await
            .unwrap();

        let report = complete_login(&state, &session, user).await.unwrap();
        assert_eq!(report.merged, vec![ProductId::new(1)]);
        assert_eq!(state.carts().count(&CartOwner::user(user.id)).await.unwrap(), 3);
        assert_eq!(state.carts().count(&guest).await.unwrap(), 0);

        // Replayed login: nothing left to merge.
        let report = complete_login(&state, &session, user).await.unwrap();
        assert_eq!(report, MergeReport::default());
        assert_eq!(state.carts().count(&CartOwner::user(user.id)).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_logout_returns_to_fresh_guest() {
        let state = state().await;
        let session = session();
        let guest = resolve(&session).await.unwrap();
        complete_login(&state, &session, CurrentUser { id: UserId::new(2) })
            .await
            .unwrap();

        complete_logout(&session).await.unwrap();
        let after = resolve(&session).await.unwrap();
        assert!(after.is_guest());
        assert_ne!(after, guest);
    }
}
