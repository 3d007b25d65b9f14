// apiserver.rs

use std::net::SocketAddr;

use tokio::{
    io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt},
    net::TcpListener,
};

use crate::*;

const BUFSZ: usize = 1024;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

pub const NOT_FOUND_BODY: &str = "Not Found";

pub fn api_router() -> Router<MyState> {
    Router::<MyState>::new(get_static)
        .route("/data", &[Method::Get], get_data)
        .route("/metrics", &[Method::Get], get_metrics)
}

pub async fn run_api_server(state: Arc<MyState>) -> anyhow::Result<()> {
    let listen = format!("0.0.0.0:{}", state.config.port);
    let addr = listen.parse::<SocketAddr>()?;

    let listener = TcpListener::bind(&addr).await?;
    info!("API server listening to {listen}");
    serve(listener, state, Arc::new(api_router())).await
}

/// Accept connections forever, one task per connection.
pub async fn serve(
    listener: TcpListener,
    state: Arc<MyState>,
    router: Arc<Router<MyState>>,
) -> anyhow::Result<()> {
    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                debug!("Client connected from {addr}");
                let state = state.clone();
                let router = router.clone();
                tokio::spawn(async move {
                    if let Err(e) = handle_client(stream, &state, &router).await {
                        error!("Client {addr} error: {e:#}");
                    }
                });
            }
            Err(e) => {
                error!("Accept failed: {e}");
            }
        }
    }
}

/// Read one request, answer it and close.
pub async fn handle_client<S>(
    mut sock: S,
    state: &MyState,
    router: &Router<MyState>,
) -> anyhow::Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let head = match timeout(REQUEST_TIMEOUT, read_head(&mut sock)).await {
        Ok(head) => head?,
        Err(_) => {
            warn!("Request not received in {REQUEST_TIMEOUT:?}, closing");
            return Ok(());
        }
    };

    let req = match parse_request(&head) {
        Ok(req) => req,
        Err(e) => {
            warn!("Bad request: {e:#}");
            return Ok(());
        }
    };

    let resp = router.dispatch(state, &req);
    resp.write_to(&mut sock).await?;
    sock.shutdown().await?;
    Ok(())
}

// the request body, if any, is never read
async fn read_head<R: AsyncRead + Unpin>(sock: &mut R) -> anyhow::Result<Vec<u8>> {
    let mut head = Vec::with_capacity(BUFSZ);
    let mut buf = [0; 256];
    loop {
        let n = sock.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        head.extend_from_slice(&buf[..n]);
        if let Some(len) = head_len(&head) {
            head.truncate(len);
            break;
        }
        if head.len() >= BUFSZ {
            break;
        }
    }
    Ok(head)
}

/// Answer for anything nothing else serves.
///
/// Note: the status line is 200 OK, only the body says "Not Found".
pub fn not_found() -> Response {
    Response::ok(CT_HTML, NOT_FOUND_BODY)
}

pub fn get_data(state: &MyState, _req: &Request) -> Response {
    let cnt = state.next_cnt();
    info!("#{cnt} get_data()");

    let snapshot = state.fresh_snapshot();
    match to_json(&snapshot, state.clock.as_ref()) {
        Ok(json) => Response::ok(CT_JSON, json),
        Err(e) => {
            let msg = format!("JSON error: {e:?}\n");
            error!("{msg}");
            Response::error(500, "Internal Server Error", msg)
        }
    }
}

pub fn get_metrics(state: &MyState, _req: &Request) -> Response {
    let cnt = state.next_cnt();
    info!("#{cnt} get_metrics()");

    let snapshot = state.fresh_snapshot();
    Response::ok(CT_JSON, to_prometheus(&snapshot))
}

pub fn get_static(state: &MyState, req: &Request) -> Response {
    let cnt = state.next_cnt();
    info!("#{cnt} get_static({} {})", req.method, req.path);

    if req.method != Method::Get {
        return not_found();
    }
    match state.assets.get(&req.path) {
        Some(asset) => Response::ok(asset.content_type, asset.body.clone()),
        None => not_found(),
    }
}


// EOF
