use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240101_000001_create_products_table::Migration),
            Box::new(m20240101_000002_create_clients_table::Migration),
            Box::new(m20240101_000003_create_reservations_table::Migration),
            Box::new(m20240101_000004_create_sales_table::Migration),
            Box::new(m20240101_000005_create_returns_table::Migration),
            Box::new(m20240101_000006_create_invoices_table::Migration),
        ]
    }
}

// Migration implementations

mod m20240101_000001_create_products_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000001_create_products_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Products::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Products::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Products::Name).string().not_null())
                        .col(ColumnDef::new(Products::Size).string())
                        .col(ColumnDef::new(Products::Color).string())
                        .col(ColumnDef::new(Products::Location).string())
                        .col(
                            ColumnDef::new(Products::Quantity)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Products::DamagedAmount)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(ColumnDef::new(Products::Price).decimal())
                        .col(
                            ColumnDef::new(Products::Version)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Products::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(ColumnDef::new(Products::UpdatedAt).timestamp_with_time_zone())
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("idx_products_name")
                        .table(Products::Table)
                        .col(Products::Name)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Products::Table).to_owned())
                .await
        }
    }

    #[derive(Iden)]
    enum Products {
        Table,
        Id,
        Name,
        Size,
        Color,
        Location,
        Quantity,
        DamagedAmount,
        Price,
        Version,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240101_000002_create_clients_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000002_create_clients_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Clients::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Clients::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Clients::Name).string().not_null())
                        .col(ColumnDef::new(Clients::Email).string())
                        .col(ColumnDef::new(Clients::Phone).string())
                        .col(ColumnDef::new(Clients::Address).string())
                        .col(
                            ColumnDef::new(Clients::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(ColumnDef::new(Clients::UpdatedAt).timestamp_with_time_zone())
                        .to_owned(),
                )
                .await?;

            // Unique only when an email is present; null emails are allowed to repeat.
            manager
                .create_index(
                    Index::create()
                        .name("idx_clients_email_unique")
                        .table(Clients::Table)
                        .col(Clients::Email)
                        .unique()
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Clients::Table).to_owned())
                .await
        }
    }

    #[derive(Iden)]
    enum Clients {
        Table,
        Id,
        Name,
        Email,
        Phone,
        Address,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240101_000003_create_reservations_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000003_create_reservations_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Reservations::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Reservations::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(Reservations::ProductId).uuid())
                        .col(ColumnDef::new(Reservations::ProductName).string().not_null())
                        .col(ColumnDef::new(Reservations::ClientId).uuid())
                        .col(ColumnDef::new(Reservations::ClientName).string())
                        .col(ColumnDef::new(Reservations::ClientPhone).string())
                        .col(ColumnDef::new(Reservations::ClientAddress).string())
                        .col(
                            ColumnDef::new(Reservations::Quantity)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Reservations::DamagedAmount)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(ColumnDef::new(Reservations::Size).string())
                        .col(ColumnDef::new(Reservations::Location).string())
                        .col(ColumnDef::new(Reservations::ReservedFor).date())
                        .col(ColumnDef::new(Reservations::Status).string().not_null())
                        .col(
                            ColumnDef::new(Reservations::ReservedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(ColumnDef::new(Reservations::DiscountAmount).decimal())
                        .col(ColumnDef::new(Reservations::FinalAmount).decimal())
                        .col(ColumnDef::new(Reservations::PaidAmount).decimal())
                        .col(
                            ColumnDef::new(Reservations::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(ColumnDef::new(Reservations::UpdatedAt).timestamp_with_time_zone())
                        .to_owned(),
                )
                .await?;

            // Supports the pending-reservation merge lookup.
            manager
                .create_index(
                    Index::create()
                        .name("idx_reservations_merge_key")
                        .table(Reservations::Table)
                        .col(Reservations::ProductId)
                        .col(Reservations::ClientId)
                        .col(Reservations::Status)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Reservations::Table).to_owned())
                .await
        }
    }

    #[derive(Iden)]
    enum Reservations {
        Table,
        Id,
        ProductId,
        ProductName,
        ClientId,
        ClientName,
        ClientPhone,
        ClientAddress,
        Quantity,
        DamagedAmount,
        Size,
        Location,
        ReservedFor,
        Status,
        ReservedAt,
        DiscountAmount,
        FinalAmount,
        PaidAmount,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240101_000004_create_sales_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000004_create_sales_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Sales::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Sales::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Sales::ProductId).uuid().not_null())
                        .col(ColumnDef::new(Sales::ReservationId).uuid())
                        .col(ColumnDef::new(Sales::CustomerName).string())
                        .col(ColumnDef::new(Sales::CustomerPhone).string())
                        .col(ColumnDef::new(Sales::Quantity).integer().not_null())
                        .col(ColumnDef::new(Sales::PricePerUnit).decimal())
                        .col(ColumnDef::new(Sales::TotalAmount).decimal().not_null())
                        .col(ColumnDef::new(Sales::DiscountType).string())
                        .col(ColumnDef::new(Sales::DiscountValue).decimal())
                        .col(ColumnDef::new(Sales::DiscountAmount).decimal().not_null())
                        .col(ColumnDef::new(Sales::ShippingCharges).decimal().not_null())
                        .col(ColumnDef::new(Sales::FinalAmount).decimal().not_null())
                        .col(ColumnDef::new(Sales::OrderDate).date())
                        .col(ColumnDef::new(Sales::DispatchDate).date())
                        .col(ColumnDef::new(Sales::DeliveredDate).date())
                        .col(ColumnDef::new(Sales::PaymentMethod).string())
                        .col(ColumnDef::new(Sales::Platform).string())
                        .col(
                            ColumnDef::new(Sales::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(ColumnDef::new(Sales::UpdatedAt).timestamp_with_time_zone())
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("idx_sales_product_id")
                        .table(Sales::Table)
                        .col(Sales::ProductId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Sales::Table).to_owned())
                .await
        }
    }

    #[derive(Iden)]
    enum Sales {
        Table,
        Id,
        ProductId,
        ReservationId,
        CustomerName,
        CustomerPhone,
        Quantity,
        PricePerUnit,
        TotalAmount,
        DiscountType,
        DiscountValue,
        DiscountAmount,
        ShippingCharges,
        FinalAmount,
        OrderDate,
        DispatchDate,
        DeliveredDate,
        PaymentMethod,
        Platform,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240101_000005_create_returns_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000005_create_returns_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Returns::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Returns::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Returns::ProductId).uuid())
                        .col(ColumnDef::new(Returns::ProductName).string().not_null())
                        .col(ColumnDef::new(Returns::Quantity).integer().not_null())
                        .col(
                            ColumnDef::new(Returns::Damaged)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .col(
                            ColumnDef::new(Returns::RefundMoney)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .col(ColumnDef::new(Returns::ClientName).string())
                        .col(ColumnDef::new(Returns::ClientPhone).string())
                        .col(ColumnDef::new(Returns::Reason).string())
                        .col(ColumnDef::new(Returns::Status).string().not_null())
                        .col(ColumnDef::new(Returns::ImageUrl).string())
                        .col(
                            ColumnDef::new(Returns::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(ColumnDef::new(Returns::UpdatedAt).timestamp_with_time_zone())
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Returns::Table).to_owned())
                .await
        }
    }

    #[derive(Iden)]
    enum Returns {
        Table,
        Id,
        ProductId,
        ProductName,
        Quantity,
        Damaged,
        RefundMoney,
        ClientName,
        ClientPhone,
        Reason,
        Status,
        ImageUrl,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240101_000006_create_invoices_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000006_create_invoices_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Invoices::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Invoices::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Invoices::ProductId).uuid().not_null())
                        .col(ColumnDef::new(Invoices::ReservationId).uuid())
                        .col(ColumnDef::new(Invoices::ClientId).uuid())
                        .col(ColumnDef::new(Invoices::InvoiceNumber).string().not_null())
                        .col(ColumnDef::new(Invoices::Quantity).integer().not_null())
                        .col(ColumnDef::new(Invoices::UnitPrice).decimal().not_null())
                        .col(ColumnDef::new(Invoices::TotalAmount).decimal().not_null())
                        .col(ColumnDef::new(Invoices::InvoiceDate).date().not_null())
                        .col(ColumnDef::new(Invoices::DueDate).date())
                        .col(ColumnDef::new(Invoices::Status).string().not_null())
                        .col(ColumnDef::new(Invoices::Notes).string())
                        .col(
                            ColumnDef::new(Invoices::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(ColumnDef::new(Invoices::UpdatedAt).timestamp_with_time_zone())
                        .to_owned(),
                )
                .await?;

            // Rejects the loser of the count-then-format number race instead of
            // letting a duplicate number through.
            manager
                .create_index(
                    Index::create()
                        .name("idx_invoices_number_unique")
                        .table(Invoices::Table)
                        .col(Invoices::InvoiceNumber)
                        .unique()
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Invoices::Table).to_owned())
                .await
        }
    }

    #[derive(Iden)]
    enum Invoices {
        Table,
        Id,
        ProductId,
        ReservationId,
        ClientId,
        InvoiceNumber,
        Quantity,
        UnitPrice,
        TotalAmount,
        InvoiceDate,
        DueDate,
        Status,
        Notes,
        CreatedAt,
        UpdatedAt,
    }
}
