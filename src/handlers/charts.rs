use actix_web::{web, HttpResponse, Error};
use actix_web::http::header::{ContentDisposition, DispositionParam, DispositionType};
use base64::Engine;
use log::{debug, error, warn};
use uuid::Uuid;

use crate::handlers::error_response;
use crate::models::dataset::TabularDataset;
use crate::models::response::{ChartQuery, ChartResponse, ExportQuery};
use crate::services::type_inference::infer_column_types;
use crate::services::visualization::{
    available_modes, build_view, export_csv, render_svg, ViewMode, VisualizationState, EXPORT_FILE_NAME,
};
use crate::services::ConversationService;

const CHART_FALLBACK_NOTICE: &str = "Unable to draw chart";

/// Resolve the dataset a chart or export refers to, or the error response to send
fn dataset_for(
    service: &ConversationService,
    message_id: Uuid,
    table: Option<usize>,
) -> Result<TabularDataset, HttpResponse> {
    match service.exists(message_id) {
        Ok(true) => {},
        Ok(false) => return Err(error_response(404, format!("Message with ID {} not found", message_id))),
        Err(e) => return Err(error_response(500, format!("Failed to read transcript: {}", e))),
    }

    let dataset = match table {
        Some(index) => service.table_dataset(message_id, index),
        None => service.execution_dataset(message_id),
    };
    match dataset {
        Ok(Some(dataset)) => Ok(dataset),
        Ok(None) => Err(error_response(404, format!("No tabular data available for message {}", message_id))),
        Err(e) => Err(error_response(500, format!("Failed to load data: {}", e))),
    }
}

/// Build the requested view; unavailable modes map to 409
fn chart_for(dataset: &TabularDataset, mode: ViewMode) -> Result<ChartResponse, HttpResponse> {
    let types = infer_column_types(dataset);
    let mut state = VisualizationState::new();
    if let Err(e) = state.select(mode, &types) {
        return Err(error_response(409, e.to_string()));
    }

    let view = build_view(dataset, &types, state.view_mode())
        .map_err(|e| error_response(409, e.to_string()))?;
    let (image, notice) = match state.view_mode() {
        ViewMode::Table => (None, None),
        _ => match render_svg(&view) {
            Ok(svg) => (
                Some(format!(
                    "data:image/svg+xml;base64,{}",
                    base64::engine::general_purpose::STANDARD.encode(svg)
                )),
                None,
            ),
            Err(e) => {
                warn!("Chart image unavailable, sending view only: {}", e);
                (None, Some(format!("{}: {}", CHART_FALLBACK_NOTICE, e)))
            }
        },
    };

    Ok(ChartResponse {
        view,
        available_modes: available_modes(&types),
        image,
        notice,
    })
}

/// Chart data for a query result or markdown table
pub async fn get_chart(
    message_id: web::Path<Uuid>,
    query: web::Query<ChartQuery>,
    service: web::Data<ConversationService>,
) -> Result<HttpResponse, Error> {
    let message_id = message_id.into_inner();
    debug!("Chart requested for message {} in {:?} mode", message_id, query.mode);

    let dataset = match dataset_for(&service, message_id, query.table) {
        Ok(dataset) => dataset,
        Err(response) => return Ok(response),
    };
    match chart_for(&dataset, query.mode) {
        Ok(chart) => Ok(HttpResponse::Ok().json(chart)),
        Err(response) => Ok(response),
    }
}

/// The chart as a bare SVG document
pub async fn get_chart_svg(
    message_id: web::Path<Uuid>,
    query: web::Query<ChartQuery>,
    service: web::Data<ConversationService>,
) -> Result<HttpResponse, Error> {
    let message_id = message_id.into_inner();
    if query.mode == ViewMode::Table {
        return Ok(error_response(400, "Table view has no chart image".to_string()));
    }

    let dataset = match dataset_for(&service, message_id, query.table) {
        Ok(dataset) => dataset,
        Err(response) => return Ok(response),
    };
    let types = infer_column_types(&dataset);
    let mut state = VisualizationState::new();
    if let Err(e) = state.select(query.mode, &types) {
        return Ok(error_response(409, e.to_string()));
    }

    let svg = build_view(&dataset, &types, state.view_mode()).and_then(|view| render_svg(&view));
    match svg {
        Ok(svg) => Ok(HttpResponse::Ok().content_type("image/svg+xml").body(svg)),
        Err(e) => {
            error!("Chart rendering failed for message {}: {}", message_id, e);
            Ok(error_response(500, format!("Failed to render chart: {}", e)))
        }
    }
}

/// Download the full dataset as CSV
pub async fn export_data(
    message_id: web::Path<Uuid>,
    query: web::Query<ExportQuery>,
    service: web::Data<ConversationService>,
) -> Result<HttpResponse, Error> {
    let message_id = message_id.into_inner();
    let dataset = match dataset_for(&service, message_id, query.table) {
        Ok(dataset) => dataset,
        Err(response) => return Ok(response),
    };

    match export_csv(&dataset) {
        Ok(csv) => Ok(HttpResponse::Ok()
            .content_type("text/csv; charset=utf-8")
            .insert_header(ContentDisposition {
                disposition: DispositionType::Attachment,
                parameters: vec![DispositionParam::Filename(EXPORT_FILE_NAME.to_string())],
            })
            .body(csv)),
        Err(e) => {
            error!("CSV export failed for message {}: {}", message_id, e);
            Ok(error_response(500, format!("Failed to export data: {}", e)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::dataset::Record;
    use crate::models::dataset::CellValue;
    use crate::services::visualization::ChartView;

    fn sales() -> TabularDataset {
        let mut dataset = TabularDataset::new(vec!["region".into(), "total".into()]);
        for (region, total) in [("North", 10.0), ("South", 4.0)] {
            let mut row = Record::new();
            row.insert("region".into(), CellValue::Text(region.into()));
            row.insert("total".into(), CellValue::Number(total));
            dataset.push_row(row);
        }
        dataset
    }

    #[test]
    fn bar_chart_carries_svg_data_uri() {
        let chart = chart_for(&sales(), ViewMode::Bar).unwrap();
        assert_eq!(chart.available_modes, vec![ViewMode::Table, ViewMode::Bar, ViewMode::Pie]);
        assert!(chart.image.unwrap().starts_with("data:image/svg+xml;base64,"));
    }

    #[test]
    fn undrawable_pie_keeps_view_with_notice() {
        let mut dataset = TabularDataset::new(vec!["region".into(), "delta".into()]);
        for (region, delta) in [("North", 5.0), ("South", -2.0)] {
            let mut row = Record::new();
            row.insert("region".into(), CellValue::Text(region.into()));
            row.insert("delta".into(), CellValue::Number(delta));
            dataset.push_row(row);
        }

        let chart = chart_for(&dataset, ViewMode::Pie).unwrap();
        assert!(matches!(chart.view, ChartView::Pie { .. }));
        assert!(chart.image.is_none());
        assert!(chart.notice.unwrap().starts_with(CHART_FALLBACK_NOTICE));
    }

    #[test]
    fn zero_total_pie_keeps_view_with_notice() {
        let mut dataset = TabularDataset::new(vec!["region".into(), "total".into()]);
        let mut row = Record::new();
        row.insert("region".into(), CellValue::Text("North".into()));
        row.insert("total".into(), CellValue::Number(0.0));
        dataset.push_row(row);

        let chart = chart_for(&dataset, ViewMode::Pie).unwrap();
        assert!(chart.image.is_none());
        assert!(chart.notice.is_some());
    }

    #[test]
    fn table_view_has_no_image() {
        let chart = chart_for(&sales(), ViewMode::Table).unwrap();
        assert!(chart.image.is_none());
        assert!(chart.notice.is_none());
    }

    #[test]
    fn text_only_dataset_refuses_charts() {
        let mut dataset = TabularDataset::new(vec!["name".into()]);
        let mut row = Record::new();
        row.insert("name".into(), CellValue::Text("Ada".into()));
        dataset.push_row(row);

        let response = chart_for(&dataset, ViewMode::Pie).unwrap_err();
        assert_eq!(response.status().as_u16(), 409);
    }
}
