use ratatui::{
    buffer::Buffer,
    layout::{Constraint, Layout, Rect},
    style::Stylize,
    text::Line,
    widgets::{Cell, Paragraph, Row, Table, Widget},
};

use crate::pipeline::GridView;
use crate::query::SortBy;
use crate::table::Column;

pub const COLUMN_WIDTH_MARGIN: usize = 1;
pub const MAX_COLUMN_WIDTH: usize = 40;
pub const TABLE_HEADER_HEIGHT: u16 = 1;
pub const STATUSLINE_HEIGHT: u16 = 1;

const SORT_ASCENDING: &str = " ▲";
const SORT_DESCENDING: &str = " ▼";

pub fn header_label(column: &Column, sort_by: Option<&SortBy>) -> String {
    match sort_by {
        Some(sort) if sort.id == column.id && sort.descending => format!("{}{}", column.header, SORT_DESCENDING),
        Some(sort) if sort.id == column.id => format!("{}{}", column.header, SORT_ASCENDING),
        _ => column.header.clone(),
    }
}

pub fn status_line(view: &GridView) -> String {
    format!(
        "Page {} of {} ({} rows)",
        view.current_page,
        view.page_count,
        view.filtered_count()
    )
}

// Widest of header and page cells, capped
pub fn column_widths(view: &GridView) -> Vec<usize> {
    view.visible_columns
        .iter()
        .map(|column| {
            let header = header_label(column, view.sort_by.as_ref()).chars().count();
            let cells = view
                .page()
                .iter()
                .map(|record| column.value(record).to_string().chars().count())
                .max()
                .unwrap_or(0);
            std::cmp::min(std::cmp::max(header, cells), MAX_COLUMN_WIDTH)
        })
        .collect()
}

/// Draws the current page with a header row and a status line.
pub fn render(view: &GridView, area: Rect, buf: &mut Buffer) {
    let [table_area, status_area] =
        Layout::vertical([Constraint::Min(TABLE_HEADER_HEIGHT), Constraint::Length(STATUSLINE_HEIGHT)])
            .areas(area);

    let widths: Vec<Constraint> = column_widths(view)
        .into_iter()
        .map(|w| Constraint::Length(clamp_u16(w)))
        .collect();

    let header = Row::new(
        view.visible_columns
            .iter()
            .map(|c| Cell::from(header_label(c, view.sort_by.as_ref()))),
    )
    .bold();

    let rows = view.page().iter().map(|record| {
        Row::new(
            view.visible_columns
                .iter()
                .map(|c| Cell::from(c.value(record).to_string())),
        )
    });

    Table::new(rows, widths)
        .header(header)
        .column_spacing(clamp_u16(COLUMN_WIDTH_MARGIN))
        .render(table_area, buf);

    Paragraph::new(Line::from(status_line(view))).render(status_area, buf);
}

fn clamp_u16(n: usize) -> u16 {
    u16::try_from(n).unwrap_or(u16::MAX)
}

// Header, rows and status line, saturating at u16::MAX
fn page_height(rows: usize) -> u16 {
    TABLE_HEADER_HEIGHT
        .saturating_add(clamp_u16(rows))
        .saturating_add(STATUSLINE_HEIGHT)
}

/// Renders into a buffer sized to fit the page.
pub fn render_page(view: &GridView) -> Buffer {
    let widths = column_widths(view);
    let width = widths.iter().sum::<usize>() + widths.len().saturating_sub(1) * COLUMN_WIDTH_MARGIN;
    let width = std::cmp::max(width, status_line(view).chars().count());

    let mut buf = Buffer::empty(Rect::new(0, 0, clamp_u16(width), page_height(view.page().len())));
    render(view, buf.area, &mut buf);
    buf
}

pub fn buffer_lines(buf: &Buffer) -> Vec<String> {
    let area = buf.area;
    (area.top()..area.bottom())
        .map(|y| {
            let mut line = String::new();
            for x in area.left()..area.right() {
                line.push_str(buf[(x, y)].symbol());
            }
            line.trim_end().to_string()
        })
        .collect()
}
