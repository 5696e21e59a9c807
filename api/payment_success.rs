use hyper::Response;
use vercel_runtime::{Error, Request, ResponseBody};

use itemvalue::handlers::payment_success;
use itemvalue::{logging, runtime};

async fn handler(request: Request) -> Result<Response<ResponseBody>, Error> {
    runtime::dispatch(request, |config, request| async move {
        payment_success::handle(&config, request).await
    })
    .await
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    logging::init();
    vercel_runtime::run(vercel_runtime::service_fn::<_, (Request,)>(handler)).await
}
