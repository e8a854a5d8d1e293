mod common;

use assert_matches::assert_matches;
use common::TestApp;
use stockroom_api::entities::return_record::ReturnStatus;
use stockroom_api::errors::ServiceError;
use stockroom_api::services::clients::CreateClientCommand;
use stockroom_api::services::reservations::{ClientRef, CreateReservationCommand};
use stockroom_api::services::returns::CreateReturnCommand;

#[tokio::test]
async fn marking_product_damage_moves_quantity_aside() {
    let app = TestApp::new().await;
    let product = app.seed_product("Linen shirt", 10).await;

    let updated = app
        .state
        .services
        .products
        .mark_damaged(product.id, 3)
        .await
        .unwrap();
    assert_eq!(updated.quantity, 7);
    assert_eq!(updated.damaged_amount, 3);

    let err = app
        .state
        .services
        .products
        .mark_damaged(product.id, 8)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::AmountExceedsAvailable(_));
    assert_eq!(err.status_code(), http::StatusCode::UNPROCESSABLE_ENTITY);

    let unchanged = app.product(product.id).await;
    assert_eq!(unchanged.quantity, 7);
    assert_eq!(unchanged.damaged_amount, 3);
}

#[tokio::test]
async fn deleting_a_product_orphans_reservations_but_keeps_the_snapshot() {
    let app = TestApp::new().await;
    let product = app.seed_product("Linen shirt", 10).await;

    let outcome = app
        .state
        .services
        .reservations
        .create_or_merge_reservation(CreateReservationCommand {
            product_id: product.id,
            client: ClientRef::New {
                name: "Asha".to_string(),
                phone: None,
                address: None,
            },
            quantity: 4,
            size: None,
            location: None,
            reserved_for: None,
        })
        .await
        .unwrap();

    app.state
        .services
        .products
        .delete_product(product.id)
        .await
        .unwrap();

    assert!(app
        .state
        .services
        .products
        .get_product(product.id)
        .await
        .unwrap()
        .is_none());

    let orphaned = app
        .state
        .services
        .reservations
        .get_reservation(outcome.reservation.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(orphaned.product_id, None);
    assert_eq!(orphaned.product_name, "Linen shirt");
    assert_eq!(orphaned.quantity, 4);
}

#[tokio::test]
async fn returns_are_bookkeeping_only_and_never_restock() {
    let app = TestApp::new().await;
    let product = app.seed_product("Linen shirt", 10).await;

    let created = app
        .state
        .services
        .returns
        .create_return(CreateReturnCommand {
            product_id: Some(product.id),
            quantity: 2,
            damaged: true,
            refund_money: false,
            client_name: Some("Asha".to_string()),
            client_phone: None,
            reason: Some("torn seam".to_string()),
            image_url: None,
        })
        .await
        .unwrap();
    assert_eq!(created.product_name, "Linen shirt");
    assert_eq!(created.status, ReturnStatus::Pending.to_string());
    assert_eq!(app.product(product.id).await.quantity, 10);

    let completed = app
        .state
        .services
        .returns
        .update_return_status(created.id, ReturnStatus::Completed)
        .await
        .unwrap();
    assert_eq!(completed.status, "completed");
    assert_eq!(app.product(product.id).await.quantity, 10);

    app.state
        .services
        .returns
        .delete_return(created.id)
        .await
        .unwrap();
    assert_eq!(app.product(product.id).await.quantity, 10);
}

#[tokio::test]
async fn clients_are_found_by_email() {
    let app = TestApp::new().await;

    let created = app
        .state
        .services
        .clients
        .create_client(CreateClientCommand {
            name: "Asha".to_string(),
            email: Some("asha@example.com".to_string()),
            phone: None,
            address: None,
        })
        .await
        .unwrap();

    let found = app
        .state
        .services
        .clients
        .find_by_email("asha@example.com")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.id, created.id);

    assert!(app
        .state
        .services
        .clients
        .find_by_email("nobody@example.com")
        .await
        .unwrap()
        .is_none());
}
