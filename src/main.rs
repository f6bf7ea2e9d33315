use std::sync::Arc;

use axum::body::Body;
use axum::http::Request;
use hyper::body::Incoming;
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as AutoBuilder;
use zai_gateway::config::{config_path_from_env, load_config, AppConfig};
use zai_gateway::observability::init_tracing;
use zai_gateway::routing::dispatch::{dispatch_request, normalize_base_path};
use zai_gateway::state::AppState;

fn main() {
    let config_path = config_path_from_env();
    let config = load_config(&config_path).unwrap_or_else(|e| {
        eprintln!("Failed to load configuration from '{config_path}': {e}");
        eprintln!("Please copy 'config.example.yaml' to 'config.yaml' and modify as needed.");
        std::process::exit(1);
    });

    init_tracing(&config.features.log_level);
    let runtime = build_runtime(&config);

    runtime.block_on(async move {
        run(config).await;
    });
}

fn build_runtime(config: &AppConfig) -> tokio::runtime::Runtime {
    let worker_threads = config.server.runtime_worker_threads;
    let mut runtime_builder = if worker_threads == Some(1) {
        tokio::runtime::Builder::new_current_thread()
    } else {
        let mut builder = tokio::runtime::Builder::new_multi_thread();
        if let Some(threads) = worker_threads {
            builder.worker_threads(threads);
        }
        builder
    };
    runtime_builder.enable_io();
    runtime_builder.enable_time();
    runtime_builder.build().unwrap_or_else(|e| {
        eprintln!("Failed to initialize Tokio runtime: {e}");
        std::process::exit(1);
    })
}

async fn run(config: AppConfig) {
    let host = config.server.host.clone();
    let port = config.server.port;
    let base_path = normalize_base_path(&config.server.base_path);

    let state = Arc::new(AppState::from_config(config).unwrap_or_else(|err| {
        eprintln!("Failed to initialize gateway: {err}");
        std::process::exit(1);
    }));

    tracing::info!(
        anonymous_mode = state.credentials().anonymous_mode(),
        backup_tokens = state.token_pool().len(),
        models = state.model_router.known_model_count(),
        "zai-gateway starting on {}:{} with base_path='{}'",
        host,
        port,
        base_path
    );

    let listener = tokio::net::TcpListener::bind(format!("{host}:{port}"))
        .await
        .unwrap_or_else(|err| {
            eprintln!("Failed to bind to {host}:{port}: {err}");
            std::process::exit(1);
        });

    tracing::info!("zai-gateway is ready to accept connections");
    let accept_loop = serve_accept_loop(
        listener,
        AutoBuilder::new(TokioExecutor::new()),
        state,
        Arc::<str>::from(base_path),
    );
    tokio::select! {
        () = accept_loop => {}
        result = tokio::signal::ctrl_c() => {
            if let Err(err) = result {
                tracing::error!("failed to listen for shutdown signal: {err}");
            }
            tracing::info!("shutdown signal received, no longer accepting connections");
        }
    }
}

async fn serve_accept_loop(
    listener: tokio::net::TcpListener,
    conn_builder: AutoBuilder<TokioExecutor>,
    dispatch_state: Arc<AppState>,
    dispatch_base_path: Arc<str>,
) {
    loop {
        let (stream, remote_addr) = match listener.accept().await {
            Ok((stream, remote_addr)) => (stream, remote_addr),
            Err(err) => {
                tracing::warn!(error = %err, "failed to accept connection");
                continue;
            }
        };

        if let Err(err) = stream.set_nodelay(true) {
            tracing::debug!(%remote_addr, error = %err, "failed to enable TCP_NODELAY");
        }

        let io = TokioIo::new(stream);
        let conn_builder = conn_builder.clone();
        let request_state = Arc::clone(&dispatch_state);
        let request_base_path = Arc::clone(&dispatch_base_path);
        let hyper_service = service_fn(move |request: Request<Incoming>| {
            dispatch_request(
                Arc::clone(&request_state),
                Arc::clone(&request_base_path),
                request.map(Body::new),
            )
        });

        tokio::spawn(async move {
            if let Err(err) = conn_builder.serve_connection(io, hyper_service).await {
                tracing::debug!(%remote_addr, "connection closed with error: {err:#}");
            }
        });
    }
}
