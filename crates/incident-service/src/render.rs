use std::fmt::{self, Write};

use incident_api::{LoadOrigin, TimelineView};
use incident_core::{
    iso_date_text, location_tag_class, type_emoji, type_tag_class, FilterState, Incident,
    KnownType, ALL,
};
use url::form_urlencoded;

const STAT_TILES: [KnownType; 3] = [KnownType::Theft, KnownType::Disturbance, KnownType::Vandalism];

/// Render the timeline page for one filter state.
pub fn timeline_page(timeline: &TimelineView) -> Result<String, fmt::Error> {
    let mut html = String::new();
    write_page(&mut html, timeline)?;
    Ok(html)
}

fn write_page(out: &mut String, timeline: &TimelineView) -> fmt::Result {
    out.push_str(concat!(
        "<!doctype html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n",
        "<title>HOA Incident Tracker</title>\n",
        "<meta name=\"description\" content=\"Track and manage HOA incidents\">\n",
        "</head>\n<body>\n<main class=\"timeline-page\">\n",
    ));

    writeln!(
        out,
        "<header><h1>Incident Report Timeline</h1><span class=\"badge\">Showing {} of {} incidents</span></header>",
        timeline.stats.filtered, timeline.stats.total
    )?;

    if let Some(error) = &timeline.error {
        writeln!(out, "<div class=\"error\" role=\"alert\">{}</div>", escape(error))?;
    }
    if timeline.origin == LoadOrigin::Sample {
        out.push_str("<p class=\"notice\">Showing built-in sample incidents.</p>\n");
    }

    write_type_filters(out, timeline)?;
    write_stat_tiles(out, timeline)?;
    write_filter_form(out, timeline)?;
    write_groups(out, timeline)?;

    out.push_str("</main>\n</body>\n</html>\n");
    Ok(())
}

fn write_type_filters(out: &mut String, timeline: &TimelineView) -> fmt::Result {
    out.push_str("<nav class=\"type-filters\">\n<span>Filter by incident type:</span>\n");
    for kind in &timeline.view.facets.types {
        let active = timeline.filters.incident_type.as_str() == kind.as_str();
        let href = filter_href(&timeline.filters, kind);
        let label = if kind == ALL {
            "🔍 All Types".to_string()
        } else {
            format!("{} {} ({})", type_emoji(kind), kind, timeline.stats.type_count(kind))
        };
        writeln!(
            out,
            "<a class=\"type-filter type-{}{}\" href=\"{}\">{}</a>",
            type_tag_class(kind),
            if active { " active" } else { "" },
            escape(&href),
            escape(&label)
        )?;
    }
    out.push_str("</nav>\n");
    Ok(())
}

fn write_stat_tiles(out: &mut String, timeline: &TimelineView) -> fmt::Result {
    out.push_str("<section class=\"stats\">\n");
    writeln!(
        out,
        "<a class=\"stat total\" href=\"{}\"><span>Total Incidents</span><strong>📊 {}</strong></a>",
        escape(&filter_href(&timeline.filters, ALL)),
        timeline.stats.total
    )?;
    for kind in STAT_TILES {
        writeln!(
            out,
            "<a class=\"stat type-{}\" href=\"{}\"><span>{}</span><strong>{} {}</strong></a>",
            kind.tag_class(),
            escape(&filter_href(&timeline.filters, kind.name())),
            kind.name(),
            kind.emoji(),
            timeline.stats.type_count(kind.name())
        )?;
    }
    out.push_str("</section>\n");
    Ok(())
}

fn write_filter_form(out: &mut String, timeline: &TimelineView) -> fmt::Result {
    let filters = &timeline.filters;
    out.push_str("<form class=\"advanced-filters\" method=\"get\" action=\"/\">\n");
    if !filters.incident_type.is_all() {
        writeln!(
            out,
            "<input type=\"hidden\" name=\"type\" value=\"{}\">",
            escape(filters.incident_type.as_str())
        )?;
    }

    let start = filters.date_range.start.and_then(iso_date_text).unwrap_or_default();
    let end = filters.date_range.end.and_then(iso_date_text).unwrap_or_default();
    writeln!(
        out,
        "<fieldset><legend>Filter by Date Range</legend>\
         <label>Start: <input type=\"date\" name=\"start\" value=\"{start}\"></label>\
         <label>End: <input type=\"date\" name=\"end\" value=\"{end}\"></label></fieldset>"
    )?;

    write_select(
        out,
        "Filter by Resident",
        "resident",
        "All Residents",
        &timeline.view.facets.residents,
        filters.resident.as_str(),
        |name| timeline.stats.resident_count(name),
    )?;
    write_select(
        out,
        "Filter by Location",
        "location",
        "All Locations",
        &timeline.view.facets.locations,
        filters.location.as_str(),
        |name| timeline.stats.location_count(name),
    )?;

    out.push_str(
        "<button type=\"submit\">Apply Filters</button> <a class=\"reset\" href=\"/\">Reset All Filters</a>\n</form>\n",
    );
    Ok(())
}

fn write_select(
    out: &mut String,
    legend: &str,
    name: &str,
    all_label: &str,
    values: &[String],
    selected: &str,
    count: impl Fn(&str) -> usize,
) -> fmt::Result {
    writeln!(out, "<label>{legend} <select name=\"{name}\">")?;
    writeln!(out, "<option value=\"{ALL}\">{all_label}</option>")?;
    for value in values.iter().filter(|value| value.as_str() != ALL) {
        writeln!(
            out,
            "<option value=\"{0}\"{1}>{0} ({2})</option>",
            escape(value),
            if value == selected { " selected" } else { "" },
            count(value)
        )?;
    }
    out.push_str("</select></label>\n");
    Ok(())
}

fn write_groups(out: &mut String, timeline: &TimelineView) -> fmt::Result {
    out.push_str("<section class=\"timeline\">\n");
    if timeline.view.is_empty() {
        out.push_str(
            "<div class=\"empty\"><p>No incidents match the selected filters.</p>\
             <a class=\"reset\" href=\"/\">Reset All Filters</a></div>\n",
        );
    }
    for group in &timeline.view.groups {
        writeln!(
            out,
            "<div class=\"month\" data-key=\"{}\"><h2>{}</h2>",
            escape(&group.key),
            escape(&group.label)
        )?;
        for incident in &group.incidents {
            write_card(out, incident)?;
        }
        out.push_str("</div>\n");
    }
    out.push_str("</section>\n");
    Ok(())
}

fn write_card(out: &mut String, incident: &Incident) -> fmt::Result {
    writeln!(out, "<article class=\"incident type-{}\">", type_tag_class(incident.incident_type()))?;
    write!(out, "<div class=\"when\"><strong>{}</strong>", escape(incident.occurred_at()))?;
    if let Some(time) = incident.approximate_time() {
        write!(out, " <span class=\"time\">{}</span>", escape(&display_time(time)))?;
    }
    out.push_str("</div>\n");
    writeln!(out, "<h3>{} {}</h3>", incident.emoji(), escape(incident.title()))?;

    out.push_str("<dl>\n");
    write_field(out, "Type", or_na(incident.incident_type()))?;
    writeln!(
        out,
        "<dt>Location</dt><dd><span class=\"location-tag location-{}\">{}</span></dd>",
        location_tag_class(incident.location()),
        escape(incident.location().unwrap_or("N/A"))
    )?;
    let unit = incident.unit().map_or_else(|| "N/A".to_string(), ToString::to_string);
    write_field(out, "Unit", &unit)?;
    write_field(out, "Resident", or_na(incident.resident_name()))?;
    if let Some(value) = incident.estimated_value() {
        write_field(out, "Estimated Value", &format!("${value}"))?;
    }
    out.push_str("</dl>\n");

    if let Some(notes) = incident.notes() {
        writeln!(out, "<p class=\"notes\"><span>Notes:</span> {}</p>", escape(notes))?;
    }
    out.push_str("</article>\n");
    Ok(())
}

fn write_field(out: &mut String, label: &str, value: &str) -> fmt::Result {
    writeln!(out, "<dt>{label}</dt><dd>{}</dd>", escape(value))
}

fn or_na(value: &str) -> &str {
    if value.is_empty() {
        "N/A"
    } else {
        value
    }
}

/// Hours recorded as a bare number are shown on the hour.
fn display_time(time: &str) -> String {
    if !time.is_empty() && time.chars().all(|ch| ch.is_ascii_digit()) {
        format!("{time}:00")
    } else {
        time.to_string()
    }
}

/// Link that keeps the current filters but selects `incident_type`.
fn filter_href(filters: &FilterState, incident_type: &str) -> String {
    let mut query = form_urlencoded::Serializer::new(String::new());
    if incident_type != ALL {
        query.append_pair("type", incident_type);
    }
    if !filters.resident.is_all() {
        query.append_pair("resident", filters.resident.as_str());
    }
    if !filters.location.is_all() {
        query.append_pair("location", filters.location.as_str());
    }
    if let Some(start) = filters.date_range.start.and_then(iso_date_text) {
        query.append_pair("start", &start);
    }
    if let Some(end) = filters.date_range.end.and_then(iso_date_text) {
        query.append_pair("end", &end);
    }
    let query = query.finish();
    if query.is_empty() {
        "/".to_string()
    } else {
        format!("/?{query}")
    }
}

fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            other => escaped.push(other),
        }
    }
    escaped
}
