//! Plotly-compatible figure of a sampled surface.
//!
//! The figure is plain JSON (`data` + `layout`), so any plotly front-end can render it
//! without this crate knowing about the front-end.
use crate::numerical::surface::SampleGrid;
use serde_json::{Value, json};

/// Marker drawn at the evaluation point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointMarker {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

fn surface_trace(grid: &SampleGrid) -> Value {
    json!({
        "type": "surface",
        "x": grid.xs.to_vec(),
        "y": grid.ys.to_vec(),
        "z": grid.z_rows(),
        "colorscale": [
            [0.0, "rgb(60, 120, 216)"],
            [0.25, "rgb(100, 180, 255)"],
            [0.5, "rgb(200, 240, 255)"],
            [0.75, "rgb(255, 200, 150)"],
            [1.0, "rgb(255, 100, 100)"]
        ],
        "opacity": 0.95,
        "showscale": true,
        "colorbar": {"title": {"text": "z"}, "thickness": 20, "len": 0.7},
        "lighting": {
            "ambient": 0.6,
            "diffuse": 0.8,
            "specular": 0.3,
            "roughness": 0.5,
            "fresnel": 0.2
        },
        "lightposition": {"x": 1000, "y": 1000, "z": 1000},
        "contours": {
            "z": {
                "show": true,
                "usecolormap": true,
                "highlightcolor": "rgba(255,255,255,0.5)",
                "project": {"z": true},
                "width": 2
            }
        },
        "hovertemplate": "x: %{x:.3f}<br>y: %{y:.3f}<br>z: %{z:.3f}<extra></extra>"
    })
}

fn marker_trace(marker: &PointMarker) -> Value {
    json!({
        "type": "scatter3d",
        "mode": "markers",
        "x": [marker.x],
        "y": [marker.y],
        "z": [marker.z],
        "marker": {
            "size": 10,
            "color": "rgb(230, 30, 30)",
            "line": {"color": "white", "width": 3},
            "symbol": "circle"
        },
        "name": format!("P({}, {}, {:.3})", marker.x, marker.y, marker.z),
        "showlegend": true,
        "hovertemplate": format!(
            "<b>Punto evaluado</b><br>x: {}<br>y: {}<br>z: {:.6}<extra></extra>",
            marker.x, marker.y, marker.z
        )
    })
}

fn axis(title: &str) -> Value {
    json!({
        "title": {"text": title},
        "backgroundcolor": "rgb(250, 250, 250)",
        "gridcolor": "rgb(200, 200, 200)",
        "showbackground": true,
        "zerolinecolor": "rgb(100, 100, 100)",
        "gridwidth": 2
    })
}

/// Figure with the surface and, when given, the evaluation point marker.
pub fn surface_figure(grid: &SampleGrid, function: &str, marker: Option<&PointMarker>) -> Value {
    let mut data = vec![surface_trace(grid)];
    if let Some(marker) = marker {
        data.push(marker_trace(marker));
    }
    json!({
        "data": data,
        "layout": {
            "scene": {
                "xaxis": axis("x"),
                "yaxis": axis("y"),
                "zaxis": axis("z = f(x,y)"),
                "camera": {"eye": {"x": 1.5, "y": 1.5, "z": 1.3}},
                "aspectmode": "auto"
            },
            "title": {
                "text": format!("f(x,y) = {}", function),
                "font": {"size": 16, "color": "rgb(50, 50, 50)"}
            },
            "paper_bgcolor": "white",
            "plot_bgcolor": "white",
            "font": {"family": "Arial, sans-serif", "size": 12, "color": "rgb(80, 80, 80)"}
        }
    })
}

/// `surface_figure` serialized to a JSON string.
pub fn surface_figure_json(grid: &SampleGrid, function: &str, marker: Option<&PointMarker>) -> String {
    surface_figure(grid, function, marker).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::numerical::surface::{EvaluationDomain, Surface};
    use crate::symbolic::parse_expr::parse_expression;

    fn grid() -> SampleGrid {
        Surface::for_expression(&parse_expression("x*y").unwrap())
            .sample_with_resolution(&EvaluationDomain::visualization_default(), 5)
    }

    #[test]
    fn test_surface_only() {
        let figure = surface_figure(&grid(), "x*y", None);
        let data = figure["data"].as_array().unwrap();
        assert_eq!(data.len(), 1);
        assert_eq!(data[0]["type"], "surface");
        assert_eq!(data[0]["z"].as_array().unwrap().len(), 5);
        assert_eq!(figure["layout"]["title"]["text"], "f(x,y) = x*y");
    }

    #[test]
    fn test_marker_trace() {
        let marker = PointMarker { x: 1.0, y: 2.0, z: 2.0 };
        let figure = surface_figure(&grid(), "x*y", Some(&marker));
        let trace = &figure["data"][1];
        assert_eq!(trace["type"], "scatter3d");
        assert_eq!(trace["name"], "P(1, 2, 2.000)");
        assert_eq!(trace["z"][0], 2.0);
    }

    #[test]
    fn test_serialized_figure_parses_back() {
        let text = surface_figure_json(&grid(), "x*y", None);
        let value: Value = serde_json::from_str(&text).unwrap();
        assert!(value["layout"]["scene"].is_object());
    }
}
