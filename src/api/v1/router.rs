use super::deadline::{DeadlineConfig, supervise};
use super::error::*;
use super::handler;
use crate::application_port::TokenService;
use crate::domain_model::UserId;
use crate::server::Server;
use std::convert::Infallible;
use std::sync::Arc;
use warp::{Filter, http, reject};

pub fn routes(
    server: Arc<Server>,
) -> impl Filter<Extract = (impl warp::Reply,), Error = warp::Rejection> + Clone {
    let deadline = server.deadline.clone();

    let signup = warp::post()
        .and(warp::path("signup"))
        .and(warp::path::end())
        .and(warp::body::json())
        .and(with(server.user_service.clone()))
        .and(with(server.token_service.clone()))
        .and_then({
            let deadline = deadline.clone();
            move |body, us, ts| supervise(deadline.clone(), handler::signup(body, us, ts))
        });

    let signin = warp::post()
        .and(warp::path("signin"))
        .and(warp::path::end())
        .and(warp::body::json())
        .and(with(server.user_service.clone()))
        .and(with(server.token_service.clone()))
        .and_then({
            let deadline = deadline.clone();
            move |body, us, ts| supervise(deadline.clone(), handler::signin(body, us, ts))
        });

    let signout = warp::post()
        .and(warp::path("signout"))
        .and(warp::path::end())
        .and(warp::body::json())
        .and(with(server.token_service.clone()))
        .and_then({
            let deadline = deadline.clone();
            move |body, ts| supervise(deadline.clone(), handler::signout(body, ts))
        });

    let tokens = warp::post()
        .and(warp::path("tokens"))
        .and(warp::path::end())
        .and(warp::body::json())
        .and(with(server.user_service.clone()))
        .and(with(server.token_service.clone()))
        .and_then({
            let deadline = deadline.clone();
            move |body, us, ts| supervise(deadline.clone(), handler::tokens(body, us, ts))
        });

    let me = warp::get()
        .and(warp::path("me"))
        .and(warp::path::end())
        .and(with_verification(server.token_service.clone()))
        .and(with(server.user_service.clone()))
        .and_then({
            let deadline = deadline.clone();
            move |uid, us| supervise(deadline.clone(), handler::me(uid, us))
        });

    signup.or(signin).or(signout).or(tokens).or(me)
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
    token_service: Arc<dyn TokenService>,
) -> impl Filter<Extract = (UserId,), Error = warp::Rejection> + Clone {
    warp::header::<String>(http::header::AUTHORIZATION.as_ref()).and_then(move |token: String| {
        let token_service = token_service.clone();
        async move {
            if let Some(token) = token.strip_prefix("Bearer ") {
                let user = token_service
                    .verify_identity_token(token)
                    .await
                    .map_err(ApiErrorCode::from)
                    .map_err(reject::custom)?;
                Ok(user.uid)
            } else {
                Err(reject::custom(ApiErrorCode::InvalidToken))
            }
        }
    })
}
