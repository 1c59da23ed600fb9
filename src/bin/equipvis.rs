#![cfg(not(tarpaulin_include))]

use equipvis::charts::{TABLE_COLUMNS, table_cells};
use equipvis::session::FileTokenStore;
use equipvis::{
    ClientConfig, DatasetController, DatasetId, HttpApi, LogNotifier, Route, Session,
    SessionManager, UploadCandidate, project, stat_cards, table_rows,
};
use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;

fn print_usage(program: &str) {
    eprintln!("Usage: {} <command> [args]", program);
    eprintln!("Commands:");
    eprintln!("  login <username> <password>");
    eprintln!("  register <username> <email> <password>");
    eprintln!("  logout");
    eprintln!("  history");
    eprintln!("  upload <file.csv|file.xlsx>");
    eprintln!("  show <dataset-id> [--charts <dir>]");
    eprintln!("  report <dataset-id>");
}

/// Command-line client for the equipment visualizer services
///
/// The token is kept in `token.txt` (or `EQUIPVIS_TOKEN_FILE`) between runs,
/// so `login` once and then run the other commands.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        print_usage(&args[0]);
        return Ok(());
    }

    let mut config = ClientConfig::from_env();
    let token_file = config
        .token_file
        .get_or_insert_with(|| PathBuf::from("token.txt"))
        .clone();

    let api = Arc::new(HttpApi::new(config.api_base.clone())?);
    let session = Session::restore(Arc::new(FileTokenStore::new(token_file)));
    let notifier = Arc::new(LogNotifier);
    let manager = SessionManager::new(api.clone(), session.clone(), notifier.clone());
    let controller = DatasetController::new(api, session, notifier);

    match (args[1].as_str(), &args[2..]) {
        ("login", [username, password]) => match manager.login(username, password).await {
            Ok(_) => println!("Logged in."),
            Err(e) => eprintln!("{}", e),
        },
        ("register", [username, email, password]) => {
            match manager.register(username, email, password).await {
                Ok(Route::Entry) => println!("Registration successful! Please login."),
                Ok(_) => {}
                Err(e) => eprintln!("{}", e),
            }
        }
        ("logout", []) => {
            manager.logout();
            println!("Logged out.");
        }
        ("history", []) => {
            let Ok(datasets) = controller.enter().await else {
                eprintln!("Not logged in. Run `login` first.");
                return Ok(());
            };
            if datasets.is_empty() {
                println!("No datasets yet.");
            }
            for dataset in datasets {
                println!(
                    "{:>6}  {:<40} {}",
                    dataset.id,
                    dataset.filename,
                    dataset.uploaded_at.format("%Y-%m-%d %H:%M")
                );
            }
        }
        ("upload", [path]) => {
            if manager.require_session().is_err() {
                eprintln!("Not logged in. Run `login` first.");
                return Ok(());
            }
            match controller.upload(UploadCandidate::from_path(path)).await {
                Ok(detail) => {
                    println!("Uploaded {} as dataset {}", detail.filename, detail.id);
                    print_stats(&detail.summary);
                }
                Err(e) => eprintln!("{}", e),
            }
        }
        ("show", rest) if !rest.is_empty() => {
            if manager.require_session().is_err() {
                eprintln!("Not logged in. Run `login` first.");
                return Ok(());
            }
            let charts_dir = match &rest[1..] {
                [] => None,
                [flag, dir] if flag == "--charts" => Some(PathBuf::from(dir)),
                _ => {
                    print_usage(&args[0]);
                    return Ok(());
                }
            };
            match controller.load_detail(&DatasetId::new(rest[0].as_str())).await {
                Ok(detail) => {
                    println!("{} (uploaded {})", detail.filename, detail.uploaded_at);
                    print_stats(&detail.summary);
                    print_table(&detail.data);
                    if let Some(dir) = charts_dir {
                        write_charts(&detail.summary, &dir)?;
                    }
                }
                Err(e) => eprintln!("{}", e),
            }
        }
        ("report", [id]) => {
            if manager.require_session().is_err() {
                eprintln!("Not logged in. Run `login` first.");
                return Ok(());
            }
            let detail = match controller.load_detail(&DatasetId::new(id.as_str())).await {
                Ok(detail) => detail,
                Err(e) => {
                    eprintln!("{}", e);
                    return Ok(());
                }
            };
            match controller
                .download_report(&detail, &config.download_dir)
                .await
            {
                Ok(path) => println!("Saved {}", path.display()),
                Err(e) => eprintln!("{}", e),
            }
        }
        _ => print_usage(&args[0]),
    }

    Ok(())
}

fn print_stats(summary: &equipvis::Summary) {
    for card in stat_cards(summary) {
        println!("  {:<16} {}", card.title, card.value);
    }
    match project(Some(summary)).and_then(|s| s.categorical) {
        Some(series) => {
            for (label, count) in series.labels.iter().zip(series.values.iter()) {
                println!("  {:<16} {}", label, count);
            }
        }
        None => println!("  No type distribution"),
    }
}

fn print_table(rows: &[equipvis::Row]) {
    if rows.is_empty() {
        println!("No Data Yet");
        return;
    }
    println!("{}", TABLE_COLUMNS.join(" | "));
    for row in table_rows(rows) {
        println!("{}", table_cells(row).join(" | "));
    }
}

#[cfg(feature = "render")]
fn write_charts(summary: &equipvis::Summary, dir: &Path) -> Result<(), Box<dyn std::error::Error>> {
    use equipvis::render::{ChartOptions, render_charts};

    let Some(series) = project(Some(summary)) else {
        return Ok(());
    };
    std::fs::create_dir_all(dir)?;
    let rendered = render_charts(&series, &ChartOptions::default())?;
    if let Some(svg) = rendered.pie {
        let path = dir.join("type_distribution.svg");
        std::fs::write(&path, svg)?;
        println!("Wrote {}", path.display());
    }
    if let Some(svg) = rendered.bars {
        let path = dir.join("average_values.svg");
        std::fs::write(&path, svg)?;
        println!("Wrote {}", path.display());
    }
    Ok(())
}

#[cfg(not(feature = "render"))]
fn write_charts(_summary: &equipvis::Summary, _dir: &Path) -> Result<(), Box<dyn std::error::Error>> {
    eprintln!("Chart output requires the 'render' feature");
    Ok(())
}
