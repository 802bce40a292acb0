//! HTTP/1 accept loop.

use std::convert::Infallible;

use hyper::Request;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use crate::routes;
use crate::routes::AppState;

/// Serves `state` on `listener` until `cancel` fires.
///
/// On cancellation no new connections are accepted, open connections are
/// shut down gracefully, and this returns once all of them have closed.
pub async fn serve(listener: TcpListener, state: AppState, cancel: CancellationToken) {
    let connections = TaskTracker::new();

    loop {
        let (stream, peer) = tokio::select! {
            _ = cancel.cancelled() => break,
            accepted = listener.accept() => match accepted {
                Ok(accepted) => accepted,
                Err(e) => {
                    log::warn!("accept failed: {}", e);
                    continue;
                }
            },
        };

        let state = state.clone();
        let cancel = cancel.clone();

        connections.spawn(async move {
            let service = service_fn(move |req: Request<Incoming>| {
                let state = state.clone();
                async move { Ok::<_, Infallible>(routes::handle(&state, req).await) }
            });

            let conn = http1::Builder::new().serve_connection(TokioIo::new(stream), service);
            tokio::pin!(conn);

            let result = tokio::select! {
                result = conn.as_mut() => result,
                _ = cancel.cancelled() => {
                    conn.as_mut().graceful_shutdown();
                    conn.as_mut().await
                }
            };

            // Clients hanging up early is routine
            if let Err(e) = result {
                log::debug!("connection from {} ended: {}", peer, e);
            }
        });
    }

    connections.close();
    log::info!("waiting for {} open connections", connections.len());
    connections.wait().await;
}
