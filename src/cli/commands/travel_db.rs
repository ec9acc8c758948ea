//! Travel database commands.

use crate::cli::preflight::{self, Operation};
use crate::cli::{Output, TravelDbAction};
use crate::config::Settings;
use crate::travel_db;
use anyhow::Result;

/// Run a travel-db subcommand.
pub async fn run_travel_db(action: &TravelDbAction, settings: Settings) -> Result<()> {
    match action {
        TravelDbAction::Prepare { force } => {
            preflight::check(Operation::TravelDb, &settings)?;

            let spinner = Output::spinner("Preparing travel database...");
            let report = travel_db::prepare(&settings, *force).await;
            spinner.finish_and_clear();

            match report {
                Ok(report) => {
                    if report.downloaded {
                        Output::success(&format!("Downloaded {}", report.path.display()));
                    }
                    Output::success(&format!(
                        "Shifted {} timestamps by {} days",
                        report.shift.cells_updated,
                        report.shift.delta.num_days()
                    ));
                    Output::kv("Working copy", &report.path.display().to_string());
                    Output::kv("Backup", &report.backup_path.display().to_string());
                }
                Err(e) => {
                    Output::error(&format!("Failed to prepare travel database: {}", e));
                    return Err(e.into());
                }
            }
        }

        TravelDbAction::Reset => {
            let path = travel_db::reset(&settings)?;
            Output::success(&format!("Restored {}", path.display()));
            Output::info("Run 'kall travel-db prepare' to shift dates to the present.");
        }
    }

    Ok(())
}
