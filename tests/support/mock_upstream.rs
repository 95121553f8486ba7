use std::{
    collections::HashMap,
    convert::Infallible,
    sync::{Arc, RwLock},
};

use anyhow::{Context, Result};
use hyper::service::{make_service_fn, service_fn};
use hyper::{Body, Method, Request, Response, Server, StatusCode};
use serde_json::Value;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

#[derive(Clone)]
enum Reply {
    Snapshot(Value),
    Status(StatusCode),
}

/// In-memory pool API answering `GET /users/{address}`.
#[derive(Clone, Default)]
pub struct MockPool {
    replies: Arc<RwLock<HashMap<String, Reply>>>,
    hits: Arc<RwLock<HashMap<String, usize>>>,
}

impl MockPool {
    pub fn set_snapshot(&self, address: &str, snapshot: Value) {
        self.replies
            .write()
            .expect("mock pool poisoned")
            .insert(address.to_owned(), Reply::Snapshot(snapshot));
    }

    pub fn fail_with(&self, address: &str, status: StatusCode) {
        self.replies
            .write()
            .expect("mock pool poisoned")
            .insert(address.to_owned(), Reply::Status(status));
    }

    pub fn hits(&self, address: &str) -> usize {
        self.hits
            .read()
            .expect("mock pool poisoned")
            .get(address)
            .copied()
            .unwrap_or(0)
    }

    fn reply_for(&self, address: &str) -> Option<Reply> {
        *self
            .hits
            .write()
            .expect("mock pool poisoned")
            .entry(address.to_owned())
            .or_default() += 1;
        self.replies
            .read()
            .expect("mock pool poisoned")
            .get(address)
            .cloned()
    }
}

pub struct MockPoolServer {
    url: String,
    shutdown: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl MockPoolServer {
    pub async fn start(pool: MockPool) -> Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .context("failed to bind mock pool listener")?;
        let addr = listener
            .local_addr()
            .context("failed to read mock listener address")?;
        let std_listener = listener
            .into_std()
            .context("failed to convert mock listener")?;
        std_listener
            .set_nonblocking(true)
            .context("failed to set mock listener non-blocking")?;

        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        let make_service = make_service_fn(move |_| {
            let pool = pool.clone();
            async move { Ok::<_, Infallible>(service_fn(move |req| serve_request(pool.clone(), req))) }
        });

        let server = Server::from_tcp(std_listener)
            .context("failed to build mock HTTP server")?
            .serve(make_service);
        let graceful = server.with_graceful_shutdown(async {
            let _ = shutdown_rx.await;
        });

        let handle = tokio::spawn(async move {
            if let Err(err) = graceful.await {
                eprintln!("mock pool server stopped: {err}");
            }
        });

        Ok(Self {
            url: format!("http://{}", addr),
            shutdown: Some(shutdown_tx),
            handle: Some(handle),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

async fn serve_request(pool: MockPool, req: Request<Body>) -> Result<Response<Body>, Infallible> {
    if req.method() != Method::GET {
        return Ok(status(StatusCode::METHOD_NOT_ALLOWED));
    }

    let Some(address) = req.uri().path().strip_prefix("/users/") else {
        return Ok(status(StatusCode::NOT_FOUND));
    };

    let response = match pool.reply_for(address) {
        Some(Reply::Snapshot(snapshot)) => {
            let mut response = Response::new(Body::from(snapshot.to_string()));
            response.headers_mut().insert(
                hyper::header::CONTENT_TYPE,
                hyper::header::HeaderValue::from_static("application/json"),
            );
            response
        }
        Some(Reply::Status(code)) => status(code),
        None => status(StatusCode::NOT_FOUND),
    };
    Ok(response)
}

fn status(code: StatusCode) -> Response<Body> {
    let mut response = Response::new(Body::from(code.to_string()));
    *response.status_mut() = code;
    response
}
