use std::path::Path;

use anyhow::{Context, Result};
use rust_xlsxwriter::{Workbook, Worksheet};

use crate::pipeline::ProjectionRun;
use crate::predict::StatProjection;
use crate::records::Stat;
use crate::train::TargetOutcome;

pub struct ExportReport {
    pub games: usize,
    pub feature_rows: usize,
    pub metrics: usize,
    pub projections: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Text(String),
    Num(f64),
    Empty,
}

impl From<&str> for Cell {
    fn from(value: &str) -> Self {
        Cell::Text(value.to_string())
    }
}

impl From<String> for Cell {
    fn from(value: String) -> Self {
        Cell::Text(value)
    }
}

impl From<f64> for Cell {
    fn from(value: f64) -> Self {
        Cell::Num(value)
    }
}

impl From<Option<f64>> for Cell {
    fn from(value: Option<f64>) -> Self {
        value.map_or(Cell::Empty, Cell::Num)
    }
}

pub struct Sheet {
    pub name: &'static str,
    pub rows: Vec<Vec<Cell>>,
}

fn header(names: &[&str]) -> Vec<Cell> {
    names.iter().map(|n| Cell::from(*n)).collect()
}

/// The four tables of a run: Games, Features, Metrics, Projection.
pub fn run_sheets(run: &ProjectionRun) -> Vec<Sheet> {
    let mut games = vec![{
        let mut h = header(&["Date", "Game ID", "Matchup"]);
        h.extend(Stat::ALL.iter().map(|s| Cell::from(s.column())));
        h
    }];
    for game in &run.games {
        let mut row = vec![
            Cell::from(game.game_date.to_string()),
            Cell::from(game.game_id.clone()),
            Cell::from(game.matchup.clone()),
        ];
        row.extend(Stat::ALL.iter().map(|s| Cell::from(game.stat(*s))));
        games.push(row);
    }

    let mut features = vec![{
        let mut h = header(&["Date", "Opponent"]);
        h.extend(run.features.columns().iter().map(|c| Cell::from(c.clone())));
        h
    }];
    for row in run.features.rows() {
        let mut cells = vec![
            Cell::from(row.game_date.to_string()),
            row.opponent.clone().map_or(Cell::Empty, Cell::Text),
        ];
        cells.extend(row.values.iter().map(|v| Cell::Num(*v)));
        features.push(cells);
    }

    let mut metrics = vec![header(&[
        "Target",
        "Status",
        "RMSE",
        "MAE",
        "R2",
        "Baseline RMSE",
        "Baseline MAE",
        "Train",
        "Test",
        "Validation",
    ])];
    for entry in &run.report.entries {
        let mut row = vec![Cell::from(entry.target.to_string())];
        match &entry.outcome {
            TargetOutcome::Trained(m) => row.extend([
                Cell::from("trained"),
                Cell::Num(m.rmse),
                Cell::Num(m.mae),
                Cell::Num(m.r2),
                Cell::Num(m.baseline_rmse),
                Cell::Num(m.baseline_mae),
                Cell::Num(m.train_samples as f64),
                Cell::Num(m.test_samples as f64),
                Cell::from(if m.weak_validation { "random (weak)" } else { "chronological" }),
            ]),
            TargetOutcome::Skipped(err) => {
                row.push(Cell::from(err.to_string()));
            }
        }
        metrics.push(row);
    }

    let mut projection = vec![header(&["Stat", "Projection", "Season Avg"])];
    for (target, p) in run.projection.iter() {
        let avg = Stat::from_column(target.column()).and_then(|s| run.averages.get(&s).copied());
        projection.push(vec![
            Cell::from(target.to_string()),
            match p {
                StatProjection::Predicted(v) => Cell::Num(v),
                StatProjection::Unavailable => Cell::from("n/a"),
            },
            Cell::from(avg),
        ]);
    }

    vec![
        Sheet { name: "Games", rows: games },
        Sheet { name: "Features", rows: features },
        Sheet { name: "Metrics", rows: metrics },
        Sheet { name: "Projection", rows: projection },
    ]
}

pub fn export_run(path: &Path, run: &ProjectionRun) -> Result<ExportReport> {
    let sheets = run_sheets(run);
    let mut workbook = Workbook::new();
    for sheet in &sheets {
        let ws = workbook.add_worksheet();
        ws.set_name(sheet.name)?;
        write_rows(ws, &sheet.rows)?;
    }
    workbook
        .save(path)
        .with_context(|| format!("failed writing workbook to {}", path.display()))?;

    let data_rows = |idx: usize| sheets.get(idx).map_or(0, |s| s.rows.len().saturating_sub(1));
    Ok(ExportReport {
        games: data_rows(0),
        feature_rows: data_rows(1),
        metrics: data_rows(2),
        projections: data_rows(3),
    })
}

fn write_rows(worksheet: &mut Worksheet, rows: &[Vec<Cell>]) -> Result<()> {
    for (row_idx, row) in rows.iter().enumerate() {
        for (col_idx, value) in row.iter().enumerate() {
            let (r, c) = (row_idx as u32, col_idx as u16);
            match value {
                Cell::Text(text) => worksheet.write_string(r, c, text).map(|_| ()),
                Cell::Num(n) => worksheet.write_number(r, c, *n).map(|_| ()),
                Cell::Empty => Ok(()),
            }
            .with_context(|| format!("write cell ({row_idx},{col_idx})"))?;
        }
    }
    Ok(())
}
