//
//  Sample application.
//
//  Listens on localhost:4918, plain http, no ssl.
//  Answers LOCK/UNLOCK, and applies PUT/MKCOL/DELETE to an in-memory
//  tree after the lock check.
//

use std::convert::Infallible;
use std::error::Error;
use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::Arc;

use clap::Parser;
use futures_util::future::TryFutureExt;
use http::StatusCode;

use dav_locks::{body::Body, error_response, DavError, FsError, LockHandler, MemFs, MemLs};

#[derive(Clone)]
struct Server {
    dh: LockHandler,
    fs: Arc<MemFs>,
}

fn status(code: StatusCode) -> hyper::Response<Body> {
    let mut resp = hyper::Response::new(Body::empty());
    *resp.status_mut() = code;
    resp
}

impl Server {
    pub fn new() -> Self {
        let fs = MemFs::new();
        let dh = LockHandler::builder(fs.clone(), MemLs::new()).build();
        Server { dh, fs }
    }

    async fn handle(
        &self,
        req: hyper::Request<hyper::Body>,
    ) -> Result<hyper::Response<Body>, Infallible> {
        if matches!(req.method().as_str(), "LOCK" | "UNLOCK") {
            return Ok(self.dh.handle(req).await);
        }
        let (parts, _body) = req.into_parts();
        let req = hyper::Request::from_parts(parts, ());
        match self.apply(&req).await {
            Ok(resp) => Ok(resp),
            Err(e) => Ok(error_response(&e)),
        }
    }

    async fn apply(&self, req: &hyper::Request<()>) -> Result<hyper::Response<Body>, DavError> {
        if let Some(token) = self.dh.check(req).await? {
            log::debug!("{} {} with lock {}", req.method(), req.uri(), token);
        }
        let path = self.dh.path(req)?;
        let resp = match req.method().as_str() {
            "PUT" => {
                let created = self.fs.create(&path, false).is_ok();
                if !created {
                    self.fs.touch(&path)?;
                }
                status(if created {
                    StatusCode::CREATED
                } else {
                    StatusCode::NO_CONTENT
                })
            }
            "MKCOL" => match self.fs.create(&path, true) {
                Ok(()) => status(StatusCode::CREATED),
                Err(FsError::Forbidden) => status(StatusCode::METHOD_NOT_ALLOWED),
                Err(FsError::NotFound) => status(StatusCode::CONFLICT),
                Err(e) => return Err(e.into()),
            },
            "DELETE" => {
                self.fs.remove(&path)?;
                self.dh.forget(&path).await?;
                status(StatusCode::NO_CONTENT)
            }
            "GET" | "HEAD" | "OPTIONS" => status(StatusCode::OK),
            _ => status(StatusCode::NOT_IMPLEMENTED),
        };
        Ok(resp)
    }
}

#[derive(Debug, clap::Parser)]
#[command(about, version)]
struct Cli {
    /// port to listen on
    #[arg(short, long, default_value = "4918")]
    port: u16,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    let Cli { port } = Cli::parse();
    serve(port).await
}

async fn serve(port: u16) -> Result<(), Box<dyn Error>> {
    let server = Server::new();
    let make_service = hyper::service::make_service_fn(|_| {
        let server = server.clone();
        async move {
            let func = move |req| {
                let server = server.clone();
                async move { server.handle(req).await }
            };
            Ok::<_, hyper::Error>(hyper::service::service_fn(func))
        }
    });

    let addr = format!("0.0.0.0:{}", port);
    let addr = SocketAddr::from_str(&addr)?;

    let server = hyper::Server::try_bind(&addr)?
        .serve(make_service)
        .map_err(|e| eprintln!("server error: {}", e));

    println!("Serving memory tree on {}", port);
    let _ = server.await;
    Ok(())
}
