// Entry point and interactive console flow.
//
// The binary is a thin shell around the report pipeline:
// - Option [1] loads and cleans an upload, printing diagnostics.
// - Option [2] picks the Warehouse/Customer/Contractor filters.
// - Option [3] prints the dashboard for the current filters.
// - Option [4] exports the filtered data (XLSX), the manager report (PDF)
//   and the dashboard data (JSON).
// After exporting, the user can go back to the menu or exit.
use chrono::Local;
use once_cell::sync::Lazy;
use ot_report::config::{ReportConfig, CONFIG_FILE_NAME};
use ot_report::pdf::{ensure_font, render_pdf_with, ReportFont, ReportMeta, PDF_FILE_NAME};
use ot_report::reports::{build_dashboard, filter, filter_options};
use ot_report::types::{Dataset, Field, FilterSelection};
use ot_report::{loader, logging, output, util};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

// In-memory session state: the loaded dataset and the active filters.
static APP_STATE: Lazy<Mutex<AppState>> = Lazy::new(|| {
    Mutex::new(AppState {
        data: None,
        selection: FilterSelection::default(),
    })
});

struct AppState {
    data: Option<Dataset>,
    selection: FilterSelection,
}

fn state() -> MutexGuard<'static, AppState> {
    // A poisoned lock still holds usable state for a single-user shell.
    APP_STATE.lock().unwrap_or_else(|e| e.into_inner())
}

fn prompt(label: &str) -> String {
    print!("{}", label);
    let _ = io::stdout().flush();
    let mut buf = String::new();
    io::stdin().read_line(&mut buf).ok();
    buf.trim().to_string()
}

/// Ask the user whether to go back to the menu after exporting.
///
/// Returns `true` if the user chose `Y`, `false` if they chose `N`.
fn prompt_back_to_menu() -> bool {
    loop {
        match prompt("Back to menu (Y/N): ").to_uppercase().as_str() {
            "Y" => return true,
            "N" => return false,
            _ => println!("Invalid choice. Please enter Y or N."),
        }
    }
}

/// Handle option [1]: load and clean the uploaded file.
fn handle_load(config: &ReportConfig) {
    let answer = prompt(&format!(
        "File to load [{}]: ",
        config.input_path.display()
    ));
    let path = if answer.is_empty() {
        config.input_path.clone()
    } else {
        PathBuf::from(answer)
    };

    let raw = match loader::read_table(&path) {
        Ok(raw) => raw,
        Err(e) => {
            eprintln!("Failed to load file: {}\n", e);
            return;
        }
    };
    let (data, report) = loader::ingest(raw);
    for warning in &report.warnings {
        println!("Warning: {}", warning);
    }
    println!(
        "Processing dataset... ({} rows read, {} kept)",
        util::format_int(report.source_rows),
        util::format_int(report.retained_rows)
    );
    if report.dropped_rows > 0 {
        println!(
            "Note: {} rows dropped with no hours and no amount.",
            util::format_int(report.dropped_rows)
        );
    }
    if report.coerced_cells > 0 {
        println!(
            "Note: {} non-numeric values treated as blank.",
            util::format_int(report.coerced_cells)
        );
    }
    println!();

    let mut st = state();
    st.data = Some(data);
    st.selection = FilterSelection::default();
}

/// Parse a comma-separated list of 1-based option numbers.
fn parse_picks(answer: &str, options: &[String]) -> Vec<String> {
    answer
        .split(',')
        .filter_map(|p| p.trim().parse::<usize>().ok())
        .filter_map(|n| n.checked_sub(1).and_then(|i| options.get(i)).cloned())
        .collect()
}

/// Build a selection from the loaded data, asking `pick` for each filter
/// that has options. An empty answer leaves that filter unrestricted.
fn choose_filters(data: &Dataset, mut pick: impl FnMut(&str, &[String]) -> String) -> FilterSelection {
    let mut selection = FilterSelection::default();
    for (field, label) in [
        (Field::Warehouse, "Warehouse"),
        (Field::Customer, "Customer"),
        (Field::Contractor, "Contractor"),
    ] {
        let options = filter_options(data, field);
        if options.is_empty() {
            continue;
        }
        let picks = parse_picks(&pick(label, &options), &options);
        if let Some(set) = selection.set_mut(field) {
            set.extend(picks);
        }
    }
    selection
}

/// Handle option [2]: choose the allowed values of each filter.
fn handle_filters() {
    let mut st = state();
    let Some(data) = st.data.as_ref() else {
        println!("Error: No data loaded. Please load a file first (option 1).\n");
        return;
    };
    let selection = choose_filters(data, |label, options| {
        println!("Select {}:", label);
        for (i, option) in options.iter().enumerate() {
            println!("  [{}] {}", i + 1, option);
        }
        prompt("Numbers, comma separated (blank = all): ")
    });
    st.selection = selection;
    println!();
}

/// Handle option [3]: print the dashboard for the current filters.
fn handle_dashboard(config: &ReportConfig) {
    let st = state();
    let Some(data) = st.data.as_ref() else {
        println!("Error: No data loaded. Please load a file first (option 1).\n");
        return;
    };
    let view = filter(data, &st.selection);
    let dash = build_dashboard(&view, &config.currency_symbol);

    // Preview and headline metrics cover the whole upload.
    println!("Data Preview\n");
    output::preview_view(&filter(data, &FilterSelection::default()), config.preview_rows);
    println!("Total OT Hours: {}", dash.overall.hours_label);
    println!("Total OT Amount: {}", dash.overall.amount_label);
    println!("Records: {}\n", dash.overall.total_records);

    output::preview_table("Warehouse-wise Summary", &dash.warehouse_cards);
    if let Some(bars) = &dash.employee_amounts {
        output::preview_table("OT Amount by Employee (Highlighted)", bars);
    }
    if let Some(bars) = &dash.employee_hours {
        output::preview_table("OT Hours by Employee", bars);
    }
    output::preview_table("Total OT Amount by Warehouse", &dash.warehouse_amounts);
    if let Some(counts) = &dash.reason_counts {
        output::preview_table("OT Reasons Distribution", counts);
    }
}

/// Handle option [4]: write the spreadsheet, the PDF and the dashboard JSON.
///
/// The spreadsheet is written before the font is resolved, so a failed
/// font download only loses the PDF.
fn handle_export(config: &ReportConfig) {
    let st = state();
    let Some(data) = st.data.as_ref() else {
        println!("Error: No data loaded. Please load a file first (option 1).\n");
        return;
    };
    let view = filter(data, &st.selection);
    let out_dir = &config.output_dir;

    let xlsx_path = out_dir.join(output::SPREADSHEET_FILE_NAME);
    match output::export_spreadsheet(&view).and_then(|b| output::write_bytes(&xlsx_path, &b)) {
        Ok(()) => println!("Filtered data exported to {}", xlsx_path.display()),
        Err(e) => eprintln!("Write error: {}", e),
    }

    let json_path = out_dir.join("OT_Dashboard.json");
    let dash = build_dashboard(&view, &config.currency_symbol);
    match output::write_json(&json_path, &dash) {
        Ok(()) => println!("Dashboard data exported to {}", json_path.display()),
        Err(e) => eprintln!("Write error: {}", e),
    }

    let answer = prompt(&format!("Report period [{}]: ", config.report_period));
    let period = if answer.is_empty() {
        config.report_period.clone()
    } else {
        answer
    };
    let pdf_path = out_dir.join(PDF_FILE_NAME);
    match export_pdf(config, &view, &period, &pdf_path) {
        Ok(pages) => println!("Manager report ({} pages) exported to {}\n", pages, pdf_path.display()),
        Err(e) => eprintln!("PDF export failed: {}\n", e),
    }
}

fn export_pdf(
    config: &ReportConfig,
    view: &ot_report::FilteredView<'_>,
    period: &str,
    path: &Path,
) -> ot_report::Result<usize> {
    let font_path = ensure_font(&config.font_path, &config.font_url)?;
    let font = ReportFont::load(&font_path)?;
    let mut meta = ReportMeta::new(period, Local::now().naive_local());
    meta.currency = config.currency_symbol.clone();
    let doc = render_pdf_with(view, &meta, &font)?;
    output::write_bytes(path, &doc.bytes)?;
    Ok(doc.page_count)
}

fn main() {
    logging::init();
    let config = match ReportConfig::load(Path::new(CONFIG_FILE_NAME)) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("{}; using defaults.", e);
            ReportConfig::default()
        }
    };

    println!("KSH Overtime (OT) Report\n");
    loop {
        println!("[1] Load the file");
        println!("[2] Set filters");
        println!("[3] Show dashboard");
        println!("[4] Export reports\n");
        match prompt("Enter choice: ").as_str() {
            "1" => handle_load(&config),
            "2" => handle_filters(),
            "3" => handle_dashboard(&config),
            "4" => {
                println!();
                handle_export(&config);
                if !prompt_back_to_menu() {
                    println!("Exiting the program.");
                    break;
                }
            }
            _ => println!("Invalid choice. Please enter 1, 2, 3 or 4.\n"),
        }
    }
}
