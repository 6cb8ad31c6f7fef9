use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use playbox::kernel::bootstrap::{BootstrapConfig, BootstrapMachine};
use playbox::kernel::workspace::Workspace;
use playbox::models::import_dir;
use playbox::services::adapters::{JsonProjectStore, LocalSandbox};
use playbox::services::ports::store::ProjectStore;

struct CliArgs {
    project_dir: Option<PathBuf>,
    project_id: String,
    store_dir: PathBuf,
    sandbox_dir: PathBuf,
    port: u16,
}

fn parse_args() -> Result<CliArgs, String> {
    let mut args = CliArgs {
        project_dir: None,
        project_id: "default".to_string(),
        store_dir: std::env::temp_dir().join("playbox").join("projects"),
        sandbox_dir: std::env::temp_dir().join("playbox").join("sandbox"),
        port: 3000,
    };

    for arg in std::env::args().skip(1) {
        if let Some(value) = arg.strip_prefix("--project-id=") {
            args.project_id = value.to_string();
        } else if let Some(value) = arg.strip_prefix("--store-dir=") {
            args.store_dir = PathBuf::from(value);
        } else if let Some(value) = arg.strip_prefix("--sandbox-dir=") {
            args.sandbox_dir = PathBuf::from(value);
        } else if let Some(value) = arg.strip_prefix("--port=") {
            args.port = value.parse().map_err(|_| format!("bad port: {value}"))?;
        } else if arg.starts_with("--") {
            return Err(format!("unknown option: {arg}"));
        } else if args.project_dir.is_none() {
            args.project_dir = Some(PathBuf::from(arg));
        } else {
            return Err(format!("unexpected argument: {arg}"));
        }
    }

    Ok(args)
}

fn main() -> ExitCode {
    let _logging = playbox::logging::init();

    let args = match parse_args() {
        Ok(args) => args,
        Err(msg) => {
            eprintln!("{msg}");
            eprintln!(
                "usage: playbox [project-dir] [--project-id=ID] [--store-dir=DIR] [--sandbox-dir=DIR] [--port=PORT]"
            );
            return ExitCode::FAILURE;
        }
    };

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .or_else(|e| {
            tracing::error!(
                error = %e,
                "Failed to create multi-thread tokio runtime, falling back to current-thread"
            );
            tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
        }) {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("failed to start async runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(args)) {
        Ok(url) => {
            println!("preview ready at {url}");
            ExitCode::SUCCESS
        }
        Err(msg) => {
            eprintln!("{msg}");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: CliArgs) -> Result<String, String> {
    let store: Arc<dyn ProjectStore> = Arc::new(JsonProjectStore::new(&args.store_dir));

    let mut workspace = match &args.project_dir {
        Some(dir) => {
            let tree = import_dir(dir).map_err(|e| format!("import of {} failed: {e}", dir.display()))?;
            let ws = Workspace::from_tree(args.project_id.as_str(), tree, Arc::clone(&store));
            store
                .persist(&args.project_id, ws.tree().clone())
                .await
                .map_err(|e| format!("initial persist failed: {e}"))?;
            ws
        }
        None => Workspace::init(args.project_id.as_str(), Arc::clone(&store))
            .await
            .map_err(|e| format!("loading project {} failed: {e}", args.project_id))?,
    };

    let sandbox = Arc::new(LocalSandbox::new(&args.sandbox_dir, args.port));
    workspace.attach_sandbox(sandbox.clone());

    let mut machine = BootstrapMachine::new(sandbox, workspace.sync_queue(), BootstrapConfig::default());

    let mut log_rx = machine.log().subscribe();
    let printer = tokio::spawn(async move {
        while let Some(line) = log_rx.recv().await {
            println!("{line}");
        }
    });

    let result = machine.run(workspace.tree()).await;

    // Dropping the machine closes the log's last sender, so the printer
    // drains the remaining lines and ends on its own.
    drop(machine);
    let _ = printer.await;

    result.map_err(|e| format!("bootstrap failed: {e}"))
}
