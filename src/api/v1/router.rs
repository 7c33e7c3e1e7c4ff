use super::error::*;
use super::handler;
use crate::application_port::AuthService;
use crate::domain_model::AuthenticatedUser;
use crate::server::Server;
use std::convert::Infallible;
use std::sync::Arc;
use warp::{Filter, http, reject};

/// Request bodies above this size are rejected before parsing.
const MAX_BODY_BYTES: u64 = 16 * 1024;

pub fn routes(
    server: Arc<Server>,
) -> impl Filter<Extract = (impl warp::Reply,), Error = warp::Rejection> + Clone {
    auth_routes(server.auth_service.clone())
}

pub fn auth_routes(
    auth_service: Arc<dyn AuthService>,
) -> impl Filter<Extract = (impl warp::Reply,), Error = warp::Rejection> + Clone {
    let register = warp::post()
        .and(warp::path("register"))
        .and(warp::path::end())
        .and(json_body())
        .and(with(auth_service.clone()))
        .and_then(handler::register);

    let login = warp::post()
        .and(warp::path("login"))
        .and(warp::path::end())
        .and(json_body())
        .and(with(auth_service.clone()))
        .and_then(handler::login);

    let refresh = warp::post()
        .and(warp::path("refresh"))
        .and(warp::path::end())
        .and(json_body())
        .and(with(auth_service.clone()))
        .and_then(handler::refresh);

    let logout = warp::post()
        .and(warp::path("logout"))
        .and(warp::path::end())
        .and(with_verification(auth_service.clone()))
        .and(with(auth_service.clone()))
        .and_then(handler::logout);

    let me = warp::get()
        .and(warp::path("me"))
        .and(warp::path::end())
        .and(with_verification(auth_service))
        .and_then(handler::me);

    warp::path("auth").and(register.or(login).or(refresh).or(logout).or(me))
}

fn json_body<T>() -> impl Filter<Extract = (T,), Error = warp::Rejection> + Clone
where
    T: serde::de::DeserializeOwned + Send,
{
    warp::body::content_length_limit(MAX_BODY_BYTES).and(warp::body::json())
}

fn with<ServiceType>(
    service: Arc<ServiceType>,
) -> impl Filter<Extract = (Arc<ServiceType>,), Error = Infallible> + Clone
where
    ServiceType: Send + Sync + ?Sized,
{
    warp::any().map(move || service.clone())
}

fn with_verification(
    auth_service: Arc<dyn AuthService>,
) -> impl Filter<Extract = (AuthenticatedUser,), Error = warp::Rejection> + Clone {
    warp::header::optional::<String>(http::header::AUTHORIZATION.as_str()).and_then(
        move |header: Option<String>| {
            let auth_service = auth_service.clone();
            async move {
                let token = header
                    .as_deref()
                    .and_then(|h| h.strip_prefix("Bearer "))
                    .map(str::trim)
                    .filter(|t| !t.is_empty())
                    .ok_or_else(|| reject::custom(ApiErrorCode::InvalidToken))?;

                let principal = auth_service
                    .verify_access_token(token)
                    .await
                    .map_err(ApiErrorCode::from)
                    .map_err(reject::custom)?;
                Ok::<_, warp::Rejection>(principal)
            }
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::v1::recover_error;
    use crate::application_impl::*;
    use crate::application_port::*;
    use crate::domain_model::*;
    use crate::domain_port::*;
    use crate::infra_memory::*;
    use serde_json::{Value, json};
    use std::time::Duration;
    use warp::http::StatusCode;

    /// Cache that is always unreachable.
    struct DownCache;

    #[async_trait::async_trait]
    impl TokenVersionCache for DownCache {
        async fn set_current_version(
            &self,
            _: UserId,
            _: TokenId,
            _: Duration,
        ) -> Result<(), AuthError> {
            Err(AuthError::Store("connection refused".to_string()))
        }

        async fn is_current_version(&self, _: UserId, _: TokenId) -> Result<bool, AuthError> {
            Err(AuthError::Store("connection refused".to_string()))
        }

        async fn invalidate(&self, _: UserId) -> Result<(), AuthError> {
            Err(AuthError::Store("connection refused".to_string()))
        }
    }

    fn service_with_cache(cache: Option<Arc<dyn TokenVersionCache>>) -> Arc<dyn AuthService> {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let cfg = JwtConfig {
            issuer: "tokenward.test".to_string(),
            access_ttl: Duration::from_secs(60),
            refresh_ttl: Duration::from_secs(3600),
            refresh_secret_len: 32,
            signing_key: b"0123456789abcdef0123456789abcdef".to_vec(),
        };
        let cache = cache
            .unwrap_or_else(|| Arc::new(MemoryTokenVersionCache::new(clock.clone())) as _);
        let hasher: Arc<dyn CredentialHasher> =
            Arc::new(Argon2PasswordHasher::with_cost(64, 1, 1).unwrap());
        let user_repo: Arc<dyn UserRepo> = Arc::new(MemoryUserRepo::new(clock.clone()));
        let token_service = Arc::new(RealTokenService::new(
            Arc::new(JwtHs256Codec::new(&cfg, clock.clone()).unwrap()),
            cache,
            Arc::new(MemoryRefreshTokenRepo::new(clock.clone())),
            user_repo.clone(),
            hasher.clone(),
            clock,
            TokenLifetimes::from(&cfg),
        ));
        Arc::new(RealAuthService::new(user_repo, hasher, token_service))
    }

    fn api(
        auth_service: Arc<dyn AuthService>,
    ) -> impl Filter<Extract = (impl warp::Reply,), Error = Infallible> + Clone {
        auth_routes(auth_service).recover(recover_error)
    }

    fn body(resp: &warp::http::Response<warp::hyper::body::Bytes>) -> Value {
        serde_json::from_slice(resp.body()).unwrap()
    }

    async fn register_and_login(
        filter: &(impl Filter<Extract = (impl warp::Reply,), Error = Infallible> + Clone + 'static),
    ) -> Value {
        let resp = warp::test::request()
            .method("POST")
            .path("/auth/register")
            .json(&json!({
                "username": "alice",
                "email": "alice@example.com",
                "password": "P@ssw0rd1",
            }))
            .reply(filter)
            .await;
        assert_eq!(resp.status(), StatusCode::CREATED);

        let resp = warp::test::request()
            .method("POST")
            .path("/auth/login")
            .json(&json!({ "login": "alice", "password": "P@ssw0rd1" }))
            .reply(filter)
            .await;
        assert_eq!(resp.status(), StatusCode::OK);
        body(&resp)["data"].clone()
    }

    #[tokio::test]
    async fn login_then_me_then_logout() {
        let filter = api(service_with_cache(None));
        let session = register_and_login(&filter).await;
        assert_eq!(session["username"], "alice");
        assert_eq!(session["displayName"], "alice");
        let access = session["accessToken"].as_str().unwrap().to_string();
        assert!(session["refreshToken"].is_string());

        let resp = warp::test::request()
            .method("GET")
            .path("/auth/me")
            .header("authorization", format!("Bearer {}", access))
            .reply(&filter)
            .await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body(&resp)["data"]["email"], "alice@example.com");

        let resp = warp::test::request()
            .method("POST")
            .path("/auth/logout")
            .header("authorization", format!("Bearer {}", access))
            .reply(&filter)
            .await;
        assert_eq!(resp.status(), StatusCode::OK);

        let resp = warp::test::request()
            .method("GET")
            .path("/auth/me")
            .header("authorization", format!("Bearer {}", access))
            .reply(&filter)
            .await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body(&resp)["error"]["code"], "INVALID_TOKEN");
    }

    #[tokio::test]
    async fn refresh_rotates_once() {
        let filter = api(service_with_cache(None));
        let session = register_and_login(&filter).await;
        let refresh = session["refreshToken"].clone();

        let resp = warp::test::request()
            .method("POST")
            .path("/auth/refresh")
            .json(&json!({ "refreshToken": refresh }))
            .reply(&filter)
            .await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_ne!(body(&resp)["data"]["refreshToken"], refresh);

        let resp = warp::test::request()
            .method("POST")
            .path("/auth/refresh")
            .json(&json!({ "refreshToken": refresh }))
            .reply(&filter)
            .await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn bad_credentials_and_conflicts() {
        let filter = api(service_with_cache(None));
        register_and_login(&filter).await;

        let resp = warp::test::request()
            .method("POST")
            .path("/auth/login")
            .json(&json!({ "login": "alice", "password": "nope" }))
            .reply(&filter)
            .await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body(&resp)["error"]["code"], "INVALID_CREDENTIALS");

        let resp = warp::test::request()
            .method("POST")
            .path("/auth/register")
            .json(&json!({
                "username": "alice",
                "email": "someone@example.com",
                "password": "x",
            }))
            .reply(&filter)
            .await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body(&resp)["error"]["code"], "USERNAME_TAKEN");

        let resp = warp::test::request()
            .method("POST")
            .path("/auth/register")
            .body("{not json")
            .reply(&filter)
            .await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn missing_or_malformed_bearer_is_unauthorized() {
        let filter = api(service_with_cache(None));

        let resp = warp::test::request()
            .method("GET")
            .path("/auth/me")
            .reply(&filter)
            .await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

        for header in ["Basic abc", "Bearer ", "Bearer not.a.jwt"] {
            let resp = warp::test::request()
                .method("GET")
                .path("/auth/me")
                .header("authorization", header)
                .reply(&filter)
                .await;
            assert_eq!(resp.status(), StatusCode::UNAUTHORIZED, "{header}");
        }
    }

    #[tokio::test]
    async fn cache_outage_is_service_unavailable() {
        let filter = api(service_with_cache(Some(Arc::new(DownCache))));

        let resp = warp::test::request()
            .method("POST")
            .path("/auth/register")
            .json(&json!({
                "username": "alice",
                "email": "alice@example.com",
                "password": "P@ssw0rd1",
            }))
            .reply(&filter)
            .await;
        assert_eq!(resp.status(), StatusCode::CREATED);

        let resp = warp::test::request()
            .method("POST")
            .path("/auth/login")
            .json(&json!({ "login": "alice", "password": "P@ssw0rd1" }))
            .reply(&filter)
            .await;
        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body(&resp)["error"]["code"], "UNAVAILABLE");
    }
}
