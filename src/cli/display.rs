//! Renders `ResultData` as a `comfy-table` for the standalone `scan` command.

use comfy_table::{presets, Attribute, Cell, ContentArrangement, Table};

use crate::domain::models::{ResultData, TabularProjection};

fn base_table(headers: Vec<&'static str>) -> Table {
    let mut table = Table::new();
    table
        .load_preset(presets::UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(headers.into_iter().map(|h| Cell::new(h).add_attribute(Attribute::Bold)));
    table
}

/// Groups `data` by kind and renders one table per kind, concatenated.
pub fn render(data: &[ResultData]) -> String {
    if data.is_empty() {
        return "(no results)".to_string();
    }

    let mut out = String::new();
    render_kind(data, &mut out, "ip_alive", |d| match d {
        ResultData::IpAlive(r) => Some(r),
        _ => None,
    });
    render_kind(data, &mut out, "port_service", |d| match d {
        ResultData::PortService(r) => Some(r),
        _ => None,
    });
    render_kind(data, &mut out, "os", |d| match d {
        ResultData::Os(r) => Some(r),
        _ => None,
    });
    render_kind(data, &mut out, "web", |d| match d {
        ResultData::Web(r) => Some(r),
        _ => None,
    });
    render_kind(data, &mut out, "vuln", |d| match d {
        ResultData::Vuln(r) => Some(r),
        _ => None,
    });
    render_kind(data, &mut out, "brute", |d| match d {
        ResultData::Brute(r) => Some(r),
        _ => None,
    });
    out
}

fn render_kind<'a, T, F>(data: &'a [ResultData], out: &mut String, label: &str, project: F)
where
    T: TabularProjection,
    F: Fn(&'a ResultData) -> Option<&'a T>,
{
    let rows: Vec<&T> = data.iter().filter_map(project).collect();
    if rows.is_empty() {
        return;
    }
    let mut table = base_table(T::headers());
    for row in rows {
        table.add_row(row.row());
    }
    out.push_str(&format!("\n{label}:\n{table}\n"));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::IpAliveResult;

    #[test]
    fn empty_data_renders_placeholder() {
        assert_eq!(render(&[]), "(no results)");
    }

    #[test]
    fn renders_one_table_per_kind_present() {
        let data = vec![ResultData::IpAlive(IpAliveResult {
            ip: "10.0.0.1".parse().unwrap(),
            alive: true,
            rtt_ms: Some(1.0),
            ttl: None,
            os_guess: None,
            hostname: None,
        })];
        let rendered = render(&data);
        assert!(rendered.contains("ip_alive"));
        assert!(rendered.contains("10.0.0.1"));
    }
}
