use std::future::Future;

use http_body_util::BodyExt;
use hyper::{Request, Response};
use vercel_runtime::{Error, Request as VercelRequest, ResponseBody};

use crate::config::Config;
use crate::http::{FunctionRequest, FunctionResponse};

/// Collect the runtime request, run `handler` with the environment config
/// and hand the response back to the runtime.
pub async fn dispatch<F, Fut>(request: VercelRequest, handler: F) -> Result<Response<ResponseBody>, Error>
where
    F: FnOnce(Config, FunctionRequest) -> Fut,
    Fut: Future<Output = FunctionResponse>,
{
    let config = Config::from_env()?;

    let (parts, body) = request.into_parts();
    let body = body.collect().await?.to_bytes();
    let request: FunctionRequest = Request::from_parts(parts, body);

    let (parts, body) = handler(config, request).await.into_parts();
    Ok(Response::from_parts(parts, ResponseBody::from(body)))
}
