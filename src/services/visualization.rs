use anyhow::{anyhow, bail, Context, Result};
use log::debug;
use plotters::element::Pie;
use plotters::prelude::*;
use serde::{Deserialize, Serialize};

use crate::models::dataset::{ColumnTypeMap, TabularDataset};
use crate::services::type_inference::{as_number, infer_column_types};

/// Series/slice colors, cycled by index
pub const PALETTE: [&str; 6] = ["#0088FE", "#00C49F", "#FFBB28", "#FF8042", "#8884D8", "#82CA9D"];

const PALETTE_RGB: [RGBColor; 6] = [
    RGBColor(0x00, 0x88, 0xFE),
    RGBColor(0x00, 0xC4, 0x9F),
    RGBColor(0xFF, 0xBB, 0x28),
    RGBColor(0xFF, 0x80, 0x42),
    RGBColor(0x88, 0x84, 0xD8),
    RGBColor(0x82, 0xCA, 0x9D),
];

const CHART_SIZE: (u32, u32) = (800, 480);

pub const EXPORT_FILE_NAME: &str = "query_results.csv";

pub fn palette_color(index: usize) -> &'static str {
    PALETTE[index % PALETTE.len()]
}

fn palette_rgb(index: usize) -> RGBColor {
    PALETTE_RGB[index % PALETTE_RGB.len()]
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ViewMode {
    #[default]
    Table,
    Bar,
    Pie,
}

/// Modes the control surface offers for a dataset; charts need a numeric column
pub fn available_modes(types: &ColumnTypeMap) -> Vec<ViewMode> {
    if types.has_numeric() {
        vec![ViewMode::Table, ViewMode::Bar, ViewMode::Pie]
    } else {
        vec![ViewMode::Table]
    }
}

/// Current view of one visualization; starts on the table
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct VisualizationState {
    view_mode: ViewMode,
}

impl VisualizationState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn view_mode(&self) -> ViewMode {
        self.view_mode
    }

    /// Switch modes. Unavailable modes are refused and leave the state untouched.
    pub fn select(&mut self, mode: ViewMode, types: &ColumnTypeMap) -> Result<()> {
        if !available_modes(types).contains(&mode) {
            bail!("{:?} view needs at least one numeric column", mode);
        }
        self.view_mode = mode;
        Ok(())
    }
}

/// Category axis: first non-numeric header, or the first header when all are numeric
pub fn label_key<'a>(headers: &'a [String], types: &ColumnTypeMap) -> Option<&'a str> {
    headers
        .iter()
        .find(|h| !types.is_numeric(h))
        .or_else(|| headers.first())
        .map(String::as_str)
}

/// Magnitude for pie slices: the first numeric column
pub fn value_key<'a>(headers: &'a [String], types: &ColumnTypeMap) -> Option<&'a str> {
    types.numeric_columns(headers).into_iter().next()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BarSeries {
    pub key: String,
    pub color: String,
    /// One value per row; `None` where the cell is not numeric
    pub values: Vec<Option<f64>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PieSlice {
    pub label: String,
    pub value: f64,
    pub color: String,
}

/// Everything a client needs to draw the current view
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum ChartView {
    Table {
        headers: Vec<String>,
        rows: Vec<Vec<String>>,
    },
    Bar {
        label_key: String,
        labels: Vec<String>,
        series: Vec<BarSeries>,
    },
    Pie {
        label_key: String,
        value_key: String,
        slices: Vec<PieSlice>,
    },
}

/// Build the view for `mode`. Bar and pie fail when the dataset has no numeric column.
pub fn build_view(dataset: &TabularDataset, types: &ColumnTypeMap, mode: ViewMode) -> Result<ChartView> {
    let headers = &dataset.headers;
    let cell_text = |index: usize, header: &str| {
        dataset
            .value(index, header)
            .map(|v| v.to_string())
            .unwrap_or_default()
    };

    match mode {
        ViewMode::Table => Ok(ChartView::Table {
            headers: headers.clone(),
            rows: (0..dataset.row_count())
                .map(|i| headers.iter().map(|h| cell_text(i, h.as_str())).collect())
                .collect(),
        }),
        ViewMode::Bar => {
            let numeric = types.numeric_columns(headers);
            if numeric.is_empty() {
                bail!("bar view needs at least one numeric column");
            }
            let label = label_key(headers, types).context("dataset has no headers")?;
            let series = numeric
                .iter()
                .enumerate()
                .map(|(s, key)| BarSeries {
                    key: key.to_string(),
                    color: palette_color(s).to_string(),
                    values: (0..dataset.row_count())
                        .map(|i| dataset.value(i, key).and_then(as_number))
                        .collect(),
                })
                .collect();
            Ok(ChartView::Bar {
                label_key: label.to_string(),
                labels: (0..dataset.row_count()).map(|i| cell_text(i, label)).collect(),
                series,
            })
        }
        ViewMode::Pie => {
            let value = value_key(headers, types).context("pie view needs at least one numeric column")?;
            let label = label_key(headers, types).context("dataset has no headers")?;
            let slices = (0..dataset.row_count())
                .map(|i| PieSlice {
                    label: cell_text(i, label),
                    value: dataset.value(i, value).and_then(as_number).unwrap_or(0.0),
                    color: palette_color(i).to_string(),
                })
                .collect();
            Ok(ChartView::Pie {
                label_key: label.to_string(),
                value_key: value.to_string(),
                slices,
            })
        }
    }
}

/// Convenience: infer column types then build the view
pub fn view_for(dataset: &TabularDataset, mode: ViewMode) -> Result<ChartView> {
    let types = infer_column_types(dataset);
    build_view(dataset, &types, mode)
}

fn draw_err<E: std::fmt::Debug>(e: E) -> anyhow::Error {
    anyhow!("Failed to draw chart: {:?}", e)
}

/// Draw a bar or pie view as an SVG document
pub fn render_svg(view: &ChartView) -> Result<String> {
    let mut svg = String::new();
    match view {
        ChartView::Table { .. } => bail!("table view has no chart image"),
        ChartView::Bar { labels, series, .. } => draw_bars(&mut svg, labels, series)?,
        ChartView::Pie { slices, .. } => draw_pie(&mut svg, slices)?,
    }
    Ok(svg)
}

fn draw_bars(svg: &mut String, labels: &[String], series: &[BarSeries]) -> Result<()> {
    if labels.is_empty() {
        bail!("no rows to chart");
    }

    let values = series.iter().flat_map(|s| s.values.iter().flatten().copied());
    let (low, high) = values.fold((0.0_f64, 0.0_f64), |(lo, hi), v| (lo.min(v), hi.max(v)));
    let high = if high == low { low + 1.0 } else { high };

    let root = SVGBackend::with_string(svg, CHART_SIZE).into_drawing_area();
    root.fill(&WHITE).map_err(draw_err)?;

    let mut chart = ChartBuilder::on(&root)
        .margin(20)
        .x_label_area_size(10)
        .y_label_area_size(60)
        .build_cartesian_2d(0f64..labels.len() as f64, low..high * 1.1)
        .map_err(draw_err)?;

    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_label_formatter(&|_: &f64| String::new())
        .draw()
        .map_err(draw_err)?;

    // bars of one row share a slot of width 1 with 10% padding either side
    let width = 0.8 / series.len().max(1) as f64;
    for (s, bar) in series.iter().enumerate() {
        let color = palette_rgb(s);
        chart
            .draw_series(bar.values.iter().enumerate().filter_map(|(i, v)| {
                v.map(|v| {
                    let x0 = i as f64 + 0.1 + s as f64 * width;
                    Rectangle::new([(x0, 0.0), (x0 + width, v)], color.filled())
                })
            }))
            .map_err(draw_err)?
            .label(bar.key.clone())
            .legend(move |(x, y)| Rectangle::new([(x, y - 5), (x + 10, y + 5)], color.filled()));
    }

    chart
        .draw_series(labels.iter().enumerate().map(|(i, label)| {
            Text::new(label.clone(), (i as f64 + 0.1, low), ("sans-serif", 12))
        }))
        .map_err(draw_err)?;

    chart
        .configure_series_labels()
        .background_style(&WHITE.mix(0.8))
        .border_style(&BLACK)
        .draw()
        .map_err(draw_err)?;

    root.present().map_err(draw_err)?;
    Ok(())
}

fn draw_pie(svg: &mut String, slices: &[PieSlice]) -> Result<()> {
    let sizes: Vec<f64> = slices.iter().map(|s| s.value).collect();
    if sizes.iter().any(|v| *v < 0.0) || sizes.iter().sum::<f64>() <= 0.0 {
        bail!("pie chart needs non-negative values with a positive total");
    }
    let colors: Vec<RGBColor> = (0..slices.len()).map(palette_rgb).collect();
    let labels: Vec<String> = slices.iter().map(|s| s.label.clone()).collect();

    let root = SVGBackend::with_string(svg, CHART_SIZE).into_drawing_area();
    root.fill(&WHITE).map_err(draw_err)?;

    let center = (CHART_SIZE.0 as i32 / 2, CHART_SIZE.1 as i32 / 2);
    let radius = (CHART_SIZE.1 as f64 / 2.0) * 0.7;
    let pie = Pie::new(&center, &radius, &sizes, &colors, &labels);
    root.draw(&pie).map_err(draw_err)?;

    root.present().map_err(draw_err)?;
    debug!("Rendered pie chart with {} slices", slices.len());
    Ok(())
}

/// Serialize the whole dataset as CSV in header order, every field quoted
pub fn export_csv(dataset: &TabularDataset) -> Result<String> {
    let mut writer = csv::WriterBuilder::new()
        .quote_style(csv::QuoteStyle::Always)
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new());

    writer
        .write_record(&dataset.headers)
        .context("Failed to write CSV header")?;
    for row in &dataset.rows {
        writer
            .write_record(
                dataset
                    .headers
                    .iter()
                    .map(|h| row.get(h).map(|v| v.to_string()).unwrap_or_default()),
            )
            .context("Failed to write CSV row")?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| anyhow!("Failed to flush CSV: {}", e))?;
    String::from_utf8(bytes).context("CSV output was not UTF-8")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::dataset::{CellValue, Record};

    fn sales() -> TabularDataset {
        let mut ds = TabularDataset::new(vec!["region".into(), "q1".into(), "q2".into()]);
        for (region, q1, q2) in [("North", 10.0, 12.0), ("South", 7.5, 3.0), ("East", 4.0, 9.0)] {
            let mut record = Record::new();
            record.insert("region".into(), CellValue::text(region));
            record.insert("q1".into(), CellValue::Number(q1));
            record.insert("q2".into(), CellValue::Number(q2));
            ds.push_row(record);
        }
        ds
    }

    fn names_only() -> TabularDataset {
        let mut ds = TabularDataset::new(vec!["name".into()]);
        let mut record = Record::new();
        record.insert("name".into(), CellValue::text("Ada"));
        ds.push_row(record);
        ds
    }

    #[test]
    fn starts_in_table_mode_and_switches() {
        let types = infer_column_types(&sales());
        let mut state = VisualizationState::new();
        assert_eq!(state.view_mode(), ViewMode::Table);

        state.select(ViewMode::Pie, &types).unwrap();
        assert_eq!(state.view_mode(), ViewMode::Pie);
        state.select(ViewMode::Bar, &types).unwrap();
        assert_eq!(state.view_mode(), ViewMode::Bar);
    }

    #[test]
    fn charts_unavailable_without_numeric_columns() {
        let types = infer_column_types(&names_only());
        assert_eq!(available_modes(&types), vec![ViewMode::Table]);

        let mut state = VisualizationState::new();
        assert!(state.select(ViewMode::Bar, &types).is_err());
        assert_eq!(state.view_mode(), ViewMode::Table);
        assert!(build_view(&names_only(), &types, ViewMode::Pie).is_err());
    }

    #[test]
    fn label_key_prefers_first_text_column() {
        let headers: Vec<String> = vec!["id".into(), "name".into(), "total".into()];
        let types = ColumnTypeMap::from_pairs(vec![
            ("id".to_string(), crate::models::dataset::ColumnType::Numeric),
            ("name".to_string(), crate::models::dataset::ColumnType::Text),
            ("total".to_string(), crate::models::dataset::ColumnType::Numeric),
        ]);
        assert_eq!(label_key(&headers, &types), Some("name"));
        assert_eq!(value_key(&headers, &types), Some("id"));
    }

    #[test]
    fn label_key_falls_back_to_first_header_when_all_numeric() {
        let headers: Vec<String> = vec!["year".into(), "total".into()];
        let types = ColumnTypeMap::from_pairs(
            headers
                .iter()
                .map(|h| (h.clone(), crate::models::dataset::ColumnType::Numeric)),
        );
        assert_eq!(label_key(&headers, &types), Some("year"));
    }

    #[test]
    fn bar_view_has_one_series_per_numeric_column() {
        let ds = sales();
        let view = view_for(&ds, ViewMode::Bar).unwrap();
        match view {
            ChartView::Bar { label_key, labels, series } => {
                assert_eq!(label_key, "region");
                assert_eq!(labels, vec!["North", "South", "East"]);
                let keys: Vec<&str> = series.iter().map(|s| s.key.as_str()).collect();
                assert_eq!(keys, vec!["q1", "q2"]);
                assert_eq!(series[0].color, PALETTE[0]);
                assert_eq!(series[1].color, PALETTE[1]);
                assert_eq!(series[0].values, vec![Some(10.0), Some(7.5), Some(4.0)]);
            }
            other => panic!("expected bar view, got {:?}", other),
        }
    }

    #[test]
    fn pie_view_uses_first_numeric_column_and_cycles_colors() {
        let mut ds = TabularDataset::new(vec!["k".into(), "v".into()]);
        for i in 0..8 {
            let mut record = Record::new();
            record.insert("k".into(), CellValue::text(format!("item{}", i)));
            record.insert("v".into(), CellValue::Number(i as f64 + 1.0));
            ds.push_row(record);
        }
        match view_for(&ds, ViewMode::Pie).unwrap() {
            ChartView::Pie { label_key, value_key, slices } => {
                assert_eq!(label_key, "k");
                assert_eq!(value_key, "v");
                assert_eq!(slices.len(), 8);
                assert_eq!(slices[6].color, PALETTE[0]);
                assert_eq!(slices[7].color, PALETTE[1]);
                assert_eq!(slices[2].value, 3.0);
            }
            other => panic!("expected pie view, got {:?}", other),
        }
    }

    #[test]
    fn table_view_shows_values_as_is_in_order() {
        match view_for(&sales(), ViewMode::Table).unwrap() {
            ChartView::Table { headers, rows } => {
                assert_eq!(headers, vec!["region", "q1", "q2"]);
                assert_eq!(rows[1], vec!["South", "7.5", "3"]);
            }
            other => panic!("expected table view, got {:?}", other),
        }
    }

    #[test]
    fn csv_export_quotes_every_field() {
        let csv = export_csv(&sales()).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0], "\"region\",\"q1\",\"q2\"");

        for line in &lines {
            let fields: Vec<&str> = line.split(',').collect();
            assert_eq!(fields.len(), 3);
            assert!(fields.iter().all(|f| f.starts_with('"') && f.ends_with('"')));
        }
        assert_eq!(lines[2], "\"South\",\"7.5\",\"3\"");
    }

    #[test]
    fn csv_export_escapes_embedded_quotes() {
        let mut ds = TabularDataset::new(vec!["quote".into()]);
        let mut record = Record::new();
        record.insert("quote".into(), CellValue::text("say \"hi\""));
        ds.push_row(record);
        let csv = export_csv(&ds).unwrap();
        assert_eq!(csv, "\"quote\"\n\"say \"\"hi\"\"\"\n");
    }

    #[test]
    fn svg_rendering_for_charts() {
        let ds = sales();
        let bar = render_svg(&view_for(&ds, ViewMode::Bar).unwrap()).unwrap();
        assert!(bar.contains("<svg"));
        let pie = render_svg(&view_for(&ds, ViewMode::Pie).unwrap()).unwrap();
        assert!(pie.contains("<svg"));
        assert!(render_svg(&view_for(&ds, ViewMode::Table).unwrap()).is_err());
    }

    #[test]
    fn pie_svg_refuses_zero_total() {
        let view = ChartView::Pie {
            label_key: "k".into(),
            value_key: "v".into(),
            slices: vec![PieSlice { label: "a".into(), value: 0.0, color: PALETTE[0].into() }],
        };
        assert!(render_svg(&view).is_err());
    }
}
