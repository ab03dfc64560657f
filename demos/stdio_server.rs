//! Line-oriented JSON-RPC server on stdin/stdout.
//!
//! ```text
//! $ echo '{"jsonrpc":"2.0","method":"math.sum","params":[1,2],"id":1}' | cargo run --example stdio_server
//! {"id":1,"jsonrpc":"2.0","result":3.0}
//! ```

use std::sync::Arc;

use crapc::codec::from_params;
use crapc::{Error, JsonInterface, Outcome, Request, Router, RpcSystem};
use log::{LevelFilter, info};
use serde::Deserialize;
use serde_json::json;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

#[derive(Deserialize)]
struct Greeting {
    name: String,
}

struct App {
    math: Arc<RpcSystem>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_default_env()
        .filter_level(LevelFilter::Info)
        .init();

    let mut math = RpcSystem::new();
    math.add_function("sum", |(a, b): (f64, f64)| async move { Ok(a + b) });
    math.add_function("div", |(a, b): (f64, f64)| async move {
        if b == 0.0 {
            return Err(Error::other("division by zero"));
        }
        Ok(a / b)
    });

    let router = Arc::new(
        Router::new()
            .route("math", |app: Arc<App>, _request| async move {
                Ok(Outcome::System(app.math.clone()))
            })
            .route("greet", |_app, request: Request| async move {
                let greeting: crapc::Result<Greeting> = from_params(request.params_value());
                greeting.map(|g| Outcome::Value(json!(format!("hello, {}", g.name))))
            }),
    );
    let app = Arc::new(App {
        math: Arc::new(math),
    });
    let interface = JsonInterface::new(Arc::new(router.bind(app)));

    info!("reading requests from stdin");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let response = interface.run(&line).await?;
        stdout.write_all(response.as_bytes()).await?;
        stdout.write_all(b"\n").await?;
        stdout.flush().await?;
    }

    Ok(())
}
