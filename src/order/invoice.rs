//! PDF invoices for orders.

use std::path::{Path, PathBuf};

use printpdf::{
    BuiltinFont, IndirectFontRef, Line, LineDashPattern, Mm, PdfDocument, PdfLayerReference,
    Point,
};

use crate::{
    Error,
    order::{Order, OrderId},
};

const PAGE_WIDTH: Mm = Mm(210.0);
const PAGE_HEIGHT: Mm = Mm(297.0);
const MARGIN: f32 = 20.0;
const HEADING_SIZE: f32 = 26.0;
const LINE_SIZE: f32 = 14.0;
const LINE_HEIGHT: f32 = 8.0;

/// The file name an order's invoice is stored and served under.
pub fn invoice_file_name(order_id: OrderId) -> String {
    format!("invoice-{order_id}.pdf")
}

/// The text of each item line of the invoice.
pub fn invoice_item_lines(order: &Order) -> Vec<String> {
    order
        .items
        .iter()
        .map(|item| format!("{} - ({}) x ${:.2}", item.title, item.quantity, item.price))
        .collect()
}

/// The text of the total line of the invoice.
pub fn invoice_total_line(order: &Order) -> String {
    format!("Total: ${:.2}", order.total())
}

/// Render the invoice for `order` as a PDF document.
///
/// Items that do not fit on the first page continue on new pages.
pub fn render_invoice(order: &Order) -> Result<Vec<u8>, Error> {
    let title = invoice_file_name(order.id);
    let (document, page, layer) = PdfDocument::new(&title, PAGE_WIDTH, PAGE_HEIGHT, "Invoice");
    let font = document
        .add_builtin_font(BuiltinFont::Helvetica)
        .map_err(|error| Error::PdfError(error.to_string()))?;

    let mut layer = document.get_page(page).get_layer(layer);
    let mut y = PAGE_HEIGHT.0 - MARGIN;

    layer.use_text("Invoice", HEADING_SIZE, Mm(MARGIN), Mm(y), &font);
    draw_rule(&layer, y - 2.0, Mm(MARGIN + 42.0), None);
    y -= LINE_HEIGHT * 2.0;

    draw_dashed_rule(&layer, y);
    y -= LINE_HEIGHT;

    for line in invoice_item_lines(order) {
        if y < MARGIN + LINE_HEIGHT * 2.0 {
            let (page, new_layer) = document.add_page(PAGE_WIDTH, PAGE_HEIGHT, "Invoice");
            layer = document.get_page(page).get_layer(new_layer);
            y = PAGE_HEIGHT.0 - MARGIN;
        }

        write_line(&layer, &font, &line, y);
        y -= LINE_HEIGHT;
    }

    draw_dashed_rule(&layer, y + LINE_HEIGHT / 2.0);
    y -= LINE_HEIGHT;
    write_line(&layer, &font, &invoice_total_line(order), y);

    document
        .save_to_bytes()
        .map_err(|error| Error::PdfError(error.to_string()))
}

fn write_line(layer: &PdfLayerReference, font: &IndirectFontRef, text: &str, y: f32) {
    layer.use_text(text, LINE_SIZE, Mm(MARGIN), Mm(y), font);
}

fn draw_dashed_rule(layer: &PdfLayerReference, y: f32) {
    draw_rule(
        layer,
        y,
        Mm(PAGE_WIDTH.0 - MARGIN),
        Some(LineDashPattern {
            dash_1: Some(4),
            gap_1: Some(2),
            ..Default::default()
        }),
    );
}

fn draw_rule(layer: &PdfLayerReference, y: f32, end_x: Mm, dash: Option<LineDashPattern>) {
    layer.set_line_dash_pattern(dash.unwrap_or_default());
    layer.add_line(Line {
        points: vec![
            (Point::new(Mm(MARGIN), Mm(y)), false),
            (Point::new(end_x, Mm(y)), false),
        ],
        is_closed: false,
    });
}

/// Write the rendered invoice into `invoice_dir` and return its path.
pub async fn save_invoice(
    invoice_dir: &Path,
    order_id: OrderId,
    pdf: &[u8],
) -> Result<PathBuf, Error> {
    tokio::fs::create_dir_all(invoice_dir)
        .await
        .map_err(|error| Error::FileError(error.to_string()))?;

    let path = invoice_dir.join(invoice_file_name(order_id));
    tokio::fs::write(&path, pdf)
        .await
        .map_err(|error| Error::FileError(error.to_string()))?;

    Ok(path)
}

#[cfg(test)]
mod invoice_tests {
    use tempfile::tempdir;
    use time::OffsetDateTime;

    use crate::{
        auth::UserID,
        order::{
            Order, OrderItem,
            invoice::{invoice_item_lines, invoice_total_line, render_invoice, save_invoice},
        },
    };

    fn order() -> Order {
        Order {
            id: 7,
            user_id: UserID::new(1),
            created_at: OffsetDateTime::now_utc(),
            items: vec![
                OrderItem {
                    product_id: Some(1),
                    title: "Book".to_owned(),
                    price: 12.5,
                    description: "Pages".to_owned(),
                    quantity: 2,
                },
                OrderItem {
                    product_id: None,
                    title: "Pen".to_owned(),
                    price: 3.0,
                    description: "Ink".to_owned(),
                    quantity: 1,
                },
            ],
        }
    }

    #[test]
    fn invoice_lines_show_quantity_and_price() {
        let order = order();

        assert_eq!(
            invoice_item_lines(&order),
            vec!["Book - (2) x $12.50", "Pen - (1) x $3.00"]
        );
        assert_eq!(invoice_total_line(&order), "Total: $28.00");
    }

    #[test]
    fn invoice_total_is_rounded_to_cents() {
        let mut order = order();
        order.items = vec![OrderItem {
            product_id: Some(1),
            title: "Sticker".to_owned(),
            price: 0.1,
            description: "Small".to_owned(),
            quantity: 3,
        }];

        assert_eq!(invoice_item_lines(&order), vec!["Sticker - (3) x $0.10"]);
        assert_eq!(invoice_total_line(&order), "Total: $0.30");
    }

    #[tokio::test]
    async fn renders_and_saves_pdf() {
        let dir = tempdir().unwrap();

        let pdf = render_invoice(&order()).unwrap();
        let path = save_invoice(dir.path(), 7, &pdf).await.unwrap();

        assert!(pdf.starts_with(b"%PDF"));
        assert_eq!(path, dir.path().join("invoice-7.pdf"));
        assert_eq!(std::fs::read(path).unwrap(), pdf);
    }
}
