mod common;

use assert_matches::assert_matches;
use chrono::NaiveDate;
use common::TestApp;
use rust_decimal_macros::dec;
use stockroom_api::entities::invoice::InvoiceStatus;
use stockroom_api::errors::ServiceError;
use stockroom_api::services::invoicing::CreateInvoiceCommand;
use uuid::Uuid;

fn invoice_cmd(product_id: Uuid, invoice_date: NaiveDate) -> CreateInvoiceCommand {
    CreateInvoiceCommand {
        product_id,
        reservation_id: None,
        client_id: None,
        quantity: 2,
        unit_price: dec!(50),
        total_amount: dec!(100),
        invoice_date,
        due_date: None,
        notes: None,
    }
}

#[tokio::test]
async fn invoice_numbers_embed_the_date_and_count_upward() {
    let app = TestApp::new().await;
    let product = app.seed_product("Linen shirt", 10).await;
    let date = NaiveDate::from_ymd_opt(2024, 12, 9).unwrap();

    let first = app
        .state
        .services
        .invoices
        .create_invoice(invoice_cmd(product.id, date))
        .await
        .unwrap();
    assert_eq!(first.invoice_number, "INV-20241209-0001");
    assert_eq!(first.status, InvoiceStatus::Draft.to_string());

    let second = app
        .state
        .services
        .invoices
        .create_invoice(invoice_cmd(product.id, date))
        .await
        .unwrap();
    assert_eq!(second.invoice_number, "INV-20241209-0002");
}

#[tokio::test]
async fn invoicing_never_touches_stock() {
    let app = TestApp::new().await;
    let product = app.seed_product("Linen shirt", 10).await;
    let date = NaiveDate::from_ymd_opt(2024, 12, 9).unwrap();

    let invoice = app
        .state
        .services
        .invoices
        .create_invoice(invoice_cmd(product.id, date))
        .await
        .unwrap();
    assert_eq!(app.product(product.id).await.quantity, 10);

    app.state
        .services
        .invoices
        .delete_invoice(invoice.id)
        .await
        .unwrap();
    assert_eq!(app.product(product.id).await.quantity, 10);
}

#[tokio::test]
async fn invoice_status_walks_through_its_lifecycle() {
    let app = TestApp::new().await;
    let product = app.seed_product("Linen shirt", 10).await;
    let date = NaiveDate::from_ymd_opt(2024, 12, 9).unwrap();

    let invoice = app
        .state
        .services
        .invoices
        .create_invoice(invoice_cmd(product.id, date))
        .await
        .unwrap();

    let sent = app
        .state
        .services
        .invoices
        .update_invoice_status(invoice.id, InvoiceStatus::Sent)
        .await
        .unwrap();
    assert_eq!(sent.status, "sent");

    let paid = app
        .state
        .services
        .invoices
        .update_invoice_status(invoice.id, InvoiceStatus::Paid)
        .await
        .unwrap();
    assert_eq!(paid.status, "paid");
}

#[tokio::test]
async fn deleting_a_missing_invoice_reports_not_found() {
    let app = TestApp::new().await;

    let err = app
        .state
        .services
        .invoices
        .delete_invoice(Uuid::new_v4())
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::NotFound(_));
    assert_eq!(err.status_code(), http::StatusCode::NOT_FOUND);
}
