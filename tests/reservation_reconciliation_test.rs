mod common;

use assert_matches::assert_matches;
use common::TestApp;
use stockroom_api::entities::reservation::ReservationStatus;
use stockroom_api::errors::ServiceError;
use stockroom_api::services::reservations::{
    ClientRef, CreateReservationCommand, UpdateReservationCommand,
};

fn reserve_cmd(product_id: uuid::Uuid, client: ClientRef, quantity: i32) -> CreateReservationCommand {
    CreateReservationCommand {
        product_id,
        client,
        quantity,
        size: None,
        location: None,
        reserved_for: None,
    }
}

#[tokio::test]
async fn reserving_debits_the_product_eagerly() {
    let app = TestApp::new().await;
    let product = app.seed_product("Linen shirt", 10).await;

    let outcome = app
        .state
        .services
        .reservations
        .create_or_merge_reservation(reserve_cmd(
            product.id,
            ClientRef::New {
                name: "Asha".to_string(),
                phone: None,
                address: None,
            },
            4,
        ))
        .await
        .unwrap();

    assert!(!outcome.merged);
    assert_eq!(outcome.reservation.quantity, 4);
    assert_eq!(outcome.reservation.status(), Some(ReservationStatus::Pending));
    assert_eq!(outcome.reservation.product_name, "Linen shirt");

    assert_eq!(app.product(product.id).await.quantity, 6);
}

#[tokio::test]
async fn second_reservation_with_same_key_merges_into_the_pending_hold() {
    let app = TestApp::new().await;
    let product = app.seed_product("Linen shirt", 10).await;

    let client = app
        .state
        .services
        .clients
        .create_client(stockroom_api::services::clients::CreateClientCommand {
            name: "Asha".to_string(),
            email: None,
            phone: None,
            address: None,
        })
        .await
        .unwrap();

    let first = app
        .state
        .services
        .reservations
        .create_or_merge_reservation(reserve_cmd(product.id, ClientRef::Existing(client.id), 3))
        .await
        .unwrap();
    assert!(!first.merged);

    let second = app
        .state
        .services
        .reservations
        .create_or_merge_reservation(reserve_cmd(product.id, ClientRef::Existing(client.id), 2))
        .await
        .unwrap();

    assert!(second.merged);
    assert_eq!(second.reservation.id, first.reservation.id);
    assert_eq!(second.reservation.quantity, 5);

    // Debited only the additional quantity, never the merged total.
    assert_eq!(app.product(product.id).await.quantity, 5);

    let (rows, total) = app
        .state
        .services
        .reservations
        .list_reservations(1, 10, None, None)
        .await
        .unwrap();
    assert_eq!(total, 1);
    assert_eq!(rows.len(), 1);
}

#[tokio::test]
async fn confirmed_reservations_do_not_absorb_new_holds() {
    let app = TestApp::new().await;
    let product = app.seed_product("Linen shirt", 10).await;

    let client = app
        .state
        .services
        .clients
        .create_client(stockroom_api::services::clients::CreateClientCommand {
            name: "Asha".to_string(),
            email: None,
            phone: None,
            address: None,
        })
        .await
        .unwrap();

    let first = app
        .state
        .services
        .reservations
        .create_or_merge_reservation(reserve_cmd(product.id, ClientRef::Existing(client.id), 3))
        .await
        .unwrap();

    app.state
        .services
        .reservations
        .update_reservation_status(first.reservation.id, ReservationStatus::Confirmed)
        .await
        .unwrap();

    let second = app
        .state
        .services
        .reservations
        .create_or_merge_reservation(reserve_cmd(product.id, ClientRef::Existing(client.id), 2))
        .await
        .unwrap();

    assert!(!second.merged);
    assert_ne!(second.reservation.id, first.reservation.id);
    assert_eq!(app.product(product.id).await.quantity, 5);
}

#[tokio::test]
async fn overdrawn_reservation_is_rejected_and_leaves_state_unchanged() {
    let app = TestApp::new().await;
    let product = app.seed_product("Linen shirt", 10).await;

    let err = app
        .state
        .services
        .reservations
        .create_or_merge_reservation(reserve_cmd(
            product.id,
            ClientRef::New {
                name: "Asha".to_string(),
                phone: None,
                address: None,
            },
            11,
        ))
        .await
        .unwrap_err();

    assert_matches!(err, ServiceError::InsufficientStock(_));
    assert_eq!(err.status_code(), http::StatusCode::UNPROCESSABLE_ENTITY);

    assert_eq!(app.product(product.id).await.quantity, 10);
    let (_, total) = app
        .state
        .services
        .reservations
        .list_reservations(1, 10, None, None)
        .await
        .unwrap();
    assert_eq!(total, 0);
}

#[tokio::test]
async fn quantity_update_reconciles_by_delta_in_both_directions() {
    let app = TestApp::new().await;
    let product = app.seed_product("Linen shirt", 10).await;

    let outcome = app
        .state
        .services
        .reservations
        .create_or_merge_reservation(reserve_cmd(
            product.id,
            ClientRef::New {
                name: "Asha".to_string(),
                phone: None,
                address: None,
            },
            4,
        ))
        .await
        .unwrap();
    assert_eq!(app.product(product.id).await.quantity, 6);

    let grown = app
        .state
        .services
        .reservations
        .update_reservation_quantity(outcome.reservation.id, 7)
        .await
        .unwrap();
    assert_eq!(grown.quantity, 7);
    assert_eq!(app.product(product.id).await.quantity, 3);

    let shrunk = app
        .state
        .services
        .reservations
        .update_reservation_quantity(outcome.reservation.id, 2)
        .await
        .unwrap();
    assert_eq!(shrunk.quantity, 2);
    assert_eq!(app.product(product.id).await.quantity, 8);
}

#[tokio::test]
async fn growing_past_available_stock_is_rejected_without_partial_effects() {
    let app = TestApp::new().await;
    let product = app.seed_product("Linen shirt", 10).await;

    let outcome = app
        .state
        .services
        .reservations
        .create_or_merge_reservation(reserve_cmd(
            product.id,
            ClientRef::New {
                name: "Asha".to_string(),
                phone: None,
                address: None,
            },
            4,
        ))
        .await
        .unwrap();

    // 6 left on the shelf; growing the hold by 7 more cannot be covered.
    let err = app
        .state
        .services
        .reservations
        .update_reservation_quantity(outcome.reservation.id, 11)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::InsufficientStock(_));

    assert_eq!(app.product(product.id).await.quantity, 6);
    let unchanged = app
        .state
        .services
        .reservations
        .get_reservation(outcome.reservation.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(unchanged.quantity, 4);
}

#[tokio::test]
async fn product_switch_is_all_or_nothing() {
    let app = TestApp::new().await;
    let product_a = app.seed_product("Linen shirt", 10).await;
    let product_b = app.seed_product("Wool scarf", 2).await;

    let outcome = app
        .state
        .services
        .reservations
        .create_or_merge_reservation(reserve_cmd(
            product_a.id,
            ClientRef::New {
                name: "Asha".to_string(),
                phone: None,
                address: None,
            },
            5,
        ))
        .await
        .unwrap();
    assert_eq!(app.product(product_a.id).await.quantity, 5);

    let switch = |quantity| UpdateReservationCommand {
        reservation_id: outcome.reservation.id,
        product_id: product_b.id,
        client_id: outcome.reservation.client_id,
        quantity,
        size: None,
        location: None,
        reserved_for: None,
        status: ReservationStatus::Pending,
    };

    // Product B cannot cover 5 units; the credit to A must roll back too.
    let err = app
        .state
        .services
        .reservations
        .update_reservation(switch(5))
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::InsufficientStock(_));
    assert_eq!(app.product(product_a.id).await.quantity, 5);
    assert_eq!(app.product(product_b.id).await.quantity, 2);

    let still_on_a = app
        .state
        .services
        .reservations
        .get_reservation(outcome.reservation.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(still_on_a.product_id, Some(product_a.id));
    assert_eq!(still_on_a.quantity, 5);

    // A switch B can cover succeeds and reconciles both products.
    let moved = app
        .state
        .services
        .reservations
        .update_reservation(switch(2))
        .await
        .unwrap();
    assert_eq!(moved.product_id, Some(product_b.id));
    assert_eq!(moved.product_name, "Wool scarf");
    assert_eq!(moved.quantity, 2);
    assert_eq!(app.product(product_a.id).await.quantity, 10);
    assert_eq!(app.product(product_b.id).await.quantity, 0);
}

#[tokio::test]
async fn deleting_a_reservation_restores_the_product() {
    let app = TestApp::new().await;
    let product = app.seed_product("Linen shirt", 10).await;

    let outcome = app
        .state
        .services
        .reservations
        .create_or_merge_reservation(reserve_cmd(
            product.id,
            ClientRef::New {
                name: "Asha".to_string(),
                phone: None,
                address: None,
            },
            4,
        ))
        .await
        .unwrap();
    assert_eq!(app.product(product.id).await.quantity, 6);

    app.state
        .services
        .reservations
        .delete_reservation(outcome.reservation.id)
        .await
        .unwrap();

    assert_eq!(app.product(product.id).await.quantity, 10);
    assert!(app
        .state
        .services
        .reservations
        .get_reservation(outcome.reservation.id)
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn marking_reservation_damage_moves_quantity_without_touching_the_product() {
    let app = TestApp::new().await;
    let product = app.seed_product("Linen shirt", 10).await;

    let outcome = app
        .state
        .services
        .reservations
        .create_or_merge_reservation(reserve_cmd(
            product.id,
            ClientRef::New {
                name: "Asha".to_string(),
                phone: None,
                address: None,
            },
            5,
        ))
        .await
        .unwrap();
    assert_eq!(app.product(product.id).await.quantity, 5);

    let damaged = app
        .state
        .services
        .reservations
        .mark_damaged(outcome.reservation.id, 2)
        .await
        .unwrap();
    assert_eq!(damaged.quantity, 3);
    assert_eq!(damaged.damaged_amount, 2);
    assert_eq!(app.product(product.id).await.quantity, 5);

    // Sequential marks accumulate against the freshly-read quantity.
    let damaged = app
        .state
        .services
        .reservations
        .mark_damaged(outcome.reservation.id, 1)
        .await
        .unwrap();
    assert_eq!(damaged.quantity, 2);
    assert_eq!(damaged.damaged_amount, 3);

    let err = app
        .state
        .services
        .reservations
        .mark_damaged(outcome.reservation.id, 3)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::AmountExceedsAvailable(_));
}

#[tokio::test]
async fn status_changes_never_move_stock() {
    let app = TestApp::new().await;
    let product = app.seed_product("Linen shirt", 10).await;

    let outcome = app
        .state
        .services
        .reservations
        .create_or_merge_reservation(reserve_cmd(
            product.id,
            ClientRef::New {
                name: "Asha".to_string(),
                phone: None,
                address: None,
            },
            4,
        ))
        .await
        .unwrap();

    for status in [
        ReservationStatus::Confirmed,
        ReservationStatus::Cancelled,
        ReservationStatus::Pending,
    ] {
        let updated = app
            .state
            .services
            .reservations
            .update_reservation_status(outcome.reservation.id, status)
            .await
            .unwrap();
        assert_eq!(updated.status(), Some(status));
        assert_eq!(updated.quantity, 4);
        assert_eq!(app.product(product.id).await.quantity, 6);
    }
}
