use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240101_000001_create_reference_tables::Migration),
            Box::new(m20240101_000002_create_catalog_tables::Migration),
            Box::new(m20240101_000003_create_shipping_tables::Migration),
            Box::new(m20240101_000004_create_promo_table::Migration),
            Box::new(m20240101_000005_create_order_tables::Migration),
        ]
    }
}

mod m20240101_000001_create_reference_tables {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000001_create_reference_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Size::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Size::Id)
                                .integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(Size::Name).string().not_null().unique_key())
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(Category::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Category::Id)
                                .integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(
                            ColumnDef::new(Category::Name)
                                .string()
                                .not_null()
                                .unique_key(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(OrderStatus::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(OrderStatus::Id)
                                .integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(
                            ColumnDef::new(OrderStatus::Name)
                                .string()
                                .not_null()
                                .unique_key(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(PaymentMethod::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(PaymentMethod::Id)
                                .integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(
                            ColumnDef::new(PaymentMethod::Name)
                                .string()
                                .not_null()
                                .unique_key(),
                        )
                        .col(
                            ColumnDef::new(PaymentMethod::Allowed)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(CurrencyRate::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(CurrencyRate::Id)
                                .integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(
                            ColumnDef::new(CurrencyRate::Currency)
                                .string()
                                .not_null()
                                .unique_key(),
                        )
                        .col(
                            ColumnDef::new(CurrencyRate::Rate)
                                .decimal_len(16, 8)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(CurrencyRate::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(CurrencyRate::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(PaymentMethod::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(OrderStatus::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Category::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Size::Table).to_owned())
                .await
        }
    }

    #[derive(Iden)]
    pub enum Size {
        Table,
        Id,
        Name,
    }

    #[derive(Iden)]
    pub enum Category {
        Table,
        Id,
        Name,
    }

    #[derive(Iden)]
    pub enum OrderStatus {
        Table,
        Id,
        Name,
    }

    #[derive(Iden)]
    pub enum PaymentMethod {
        Table,
        Id,
        Name,
        Allowed,
    }

    #[derive(Iden)]
    pub enum CurrencyRate {
        Table,
        Id,
        Currency,
        Rate,
        UpdatedAt,
    }
}

mod m20240101_000002_create_catalog_tables {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000002_create_catalog_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Product::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Product::Id)
                                .integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(Product::Name).string().not_null())
                        .col(
                            ColumnDef::new(Product::SalePercentage)
                                .decimal_len(5, 2)
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Product::Hidden)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(ProductSize::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(ProductSize::Id)
                                .integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(ProductSize::ProductId).integer().not_null())
                        .col(ColumnDef::new(ProductSize::SizeId).integer().not_null())
                        .col(
                            ColumnDef::new(ProductSize::Quantity)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("idx_product_size_unique")
                        .table(ProductSize::Table)
                        .col(ProductSize::ProductId)
                        .col(ProductSize::SizeId)
                        .unique()
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(ProductPrice::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(ProductPrice::Id)
                                .integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(ProductPrice::ProductId).integer().not_null())
                        .col(ColumnDef::new(ProductPrice::Currency).string().not_null())
                        .col(
                            ColumnDef::new(ProductPrice::Price)
                                .decimal_len(12, 2)
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("idx_product_price_unique")
                        .table(ProductPrice::Table)
                        .col(ProductPrice::ProductId)
                        .col(ProductPrice::Currency)
                        .unique()
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(ProductPrice::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(ProductSize::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Product::Table).to_owned())
                .await
        }
    }

    #[derive(Iden)]
    pub enum Product {
        Table,
        Id,
        Name,
        SalePercentage,
        Hidden,
    }

    #[derive(Iden)]
    pub enum ProductSize {
        Table,
        Id,
        ProductId,
        SizeId,
        Quantity,
    }

    #[derive(Iden)]
    pub enum ProductPrice {
        Table,
        Id,
        ProductId,
        Currency,
        Price,
    }
}

mod m20240101_000003_create_shipping_tables {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000003_create_shipping_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(ShipmentCarrier::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(ShipmentCarrier::Id)
                                .integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(
                            ColumnDef::new(ShipmentCarrier::Name)
                                .string()
                                .not_null()
                                .unique_key(),
                        )
                        .col(
                            ColumnDef::new(ShipmentCarrier::Allowed)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(ShipmentCarrierPrice::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(ShipmentCarrierPrice::Id)
                                .integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(
                            ColumnDef::new(ShipmentCarrierPrice::CarrierId)
                                .integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ShipmentCarrierPrice::Currency)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ShipmentCarrierPrice::Price)
                                .decimal_len(12, 2)
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("idx_carrier_price_unique")
                        .table(ShipmentCarrierPrice::Table)
                        .col(ShipmentCarrierPrice::CarrierId)
                        .col(ShipmentCarrierPrice::Currency)
                        .unique()
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(ShipmentCarrierPrice::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(ShipmentCarrier::Table).to_owned())
                .await
        }
    }

    #[derive(Iden)]
    pub enum ShipmentCarrier {
        Table,
        Id,
        Name,
        Allowed,
    }

    #[derive(Iden)]
    pub enum ShipmentCarrierPrice {
        Table,
        Id,
        CarrierId,
        Currency,
        Price,
    }
}

mod m20240101_000004_create_promo_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000004_create_promo_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(PromoCode::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(PromoCode::Id)
                                .integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(
                            ColumnDef::new(PromoCode::Code)
                                .string()
                                .not_null()
                                .unique_key(),
                        )
                        .col(
                            ColumnDef::new(PromoCode::FreeShipping)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .col(
                            ColumnDef::new(PromoCode::DiscountPercent)
                                .decimal_len(5, 2)
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(PromoCode::Expiration)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(PromoCode::Allowed)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(PromoCode::Table).to_owned())
                .await
        }
    }

    #[derive(Iden)]
    pub enum PromoCode {
        Table,
        Id,
        Code,
        FreeShipping,
        DiscountPercent,
        Expiration,
        Allowed,
    }
}

mod m20240101_000005_create_order_tables {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000005_create_order_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Address::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Address::Id)
                                .integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(Address::Street).string().not_null())
                        .col(ColumnDef::new(Address::HouseNumber).string().not_null())
                        .col(ColumnDef::new(Address::ApartmentNumber).string())
                        .col(ColumnDef::new(Address::City).string().not_null())
                        .col(ColumnDef::new(Address::State).string().not_null())
                        .col(ColumnDef::new(Address::Country).string().not_null())
                        .col(ColumnDef::new(Address::PostalCode).string().not_null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(Buyer::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Buyer::Id)
                                .integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(Buyer::FirstName).string().not_null())
                        .col(ColumnDef::new(Buyer::LastName).string().not_null())
                        .col(ColumnDef::new(Buyer::Email).string().not_null())
                        .col(ColumnDef::new(Buyer::Phone).string().not_null())
                        .col(
                            ColumnDef::new(Buyer::BillingAddressId)
                                .integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Buyer::ShippingAddressId)
                                .integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Buyer::ReceivePromoEmails)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_buyer_billing_address")
                                .from(Buyer::Table, Buyer::BillingAddressId)
                                .to(Address::Table, Address::Id),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_buyer_shipping_address")
                                .from(Buyer::Table, Buyer::ShippingAddressId)
                                .to(Address::Table, Address::Id),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(Payment::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Payment::Id)
                                .integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(Payment::Method).string().not_null())
                        .col(ColumnDef::new(Payment::Currency).string().not_null())
                        .col(ColumnDef::new(Payment::ProviderIntentId).string())
                        .col(ColumnDef::new(Payment::TransactionAmount).decimal_len(12, 2))
                        .col(ColumnDef::new(Payment::Payer).string())
                        .col(ColumnDef::new(Payment::Payee).string())
                        .col(
                            ColumnDef::new(Payment::Done)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(Shipment::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Shipment::Id)
                                .integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(Shipment::CarrierId).integer().not_null())
                        .col(ColumnDef::new(Shipment::TrackingCode).string())
                        .col(ColumnDef::new(Shipment::ShippingDate).timestamp_with_time_zone())
                        .col(
                            ColumnDef::new(Shipment::EstimatedArrivalDate)
                                .timestamp_with_time_zone(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(CustomerOrder::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(CustomerOrder::Id)
                                .integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(
                            ColumnDef::new(CustomerOrder::Uuid)
                                .uuid()
                                .not_null()
                                .unique_key(),
                        )
                        .col(
                            ColumnDef::new(CustomerOrder::PlacedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(ColumnDef::new(CustomerOrder::Status).string().not_null())
                        .col(
                            ColumnDef::new(CustomerOrder::TotalPrice)
                                .decimal_len(12, 2)
                                .not_null()
                                .default(0),
                        )
                        .col(ColumnDef::new(CustomerOrder::Currency).string().not_null())
                        .col(
                            ColumnDef::new(CustomerOrder::RefundedAmount)
                                .decimal_len(12, 2)
                                .not_null()
                                .default(0),
                        )
                        .col(ColumnDef::new(CustomerOrder::PromoId).integer())
                        .col(ColumnDef::new(CustomerOrder::PaymentId).integer().not_null())
                        .col(
                            ColumnDef::new(CustomerOrder::ShipmentId)
                                .integer()
                                .not_null(),
                        )
                        .col(ColumnDef::new(CustomerOrder::BuyerId).integer().not_null())
                        .col(ColumnDef::new(CustomerOrder::ExpiresAt).timestamp_with_time_zone())
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_order_payment")
                                .from(CustomerOrder::Table, CustomerOrder::PaymentId)
                                .to(Payment::Table, Payment::Id),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_order_shipment")
                                .from(CustomerOrder::Table, CustomerOrder::ShipmentId)
                                .to(Shipment::Table, Shipment::Id),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_order_buyer")
                                .from(CustomerOrder::Table, CustomerOrder::BuyerId)
                                .to(Buyer::Table, Buyer::Id),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("idx_order_status_placed_at")
                        .table(CustomerOrder::Table)
                        .col(CustomerOrder::Status)
                        .col(CustomerOrder::PlacedAt)
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(OrderItem::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(OrderItem::Id)
                                .integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(OrderItem::OrderId).integer().not_null())
                        .col(ColumnDef::new(OrderItem::ProductId).integer().not_null())
                        .col(ColumnDef::new(OrderItem::SizeId).integer().not_null())
                        .col(ColumnDef::new(OrderItem::Quantity).integer().not_null())
                        .col(
                            ColumnDef::new(OrderItem::UnitBasePrice)
                                .decimal_len(12, 2)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(OrderItem::SalePercentage)
                                .decimal_len(5, 2)
                                .not_null()
                                .default(0),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_order_item_order")
                                .from(OrderItem::Table, OrderItem::OrderId)
                                .to(CustomerOrder::Table, CustomerOrder::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("idx_order_item_unique")
                        .table(OrderItem::Table)
                        .col(OrderItem::OrderId)
                        .col(OrderItem::ProductId)
                        .col(OrderItem::SizeId)
                        .unique()
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(OrderStatusHistory::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(OrderStatusHistory::Id)
                                .integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(
                            ColumnDef::new(OrderStatusHistory::OrderId)
                                .integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(OrderStatusHistory::Status)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(OrderStatusHistory::ChangedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_status_history_order")
                                .from(OrderStatusHistory::Table, OrderStatusHistory::OrderId)
                                .to(CustomerOrder::Table, CustomerOrder::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(OrderStatusHistory::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(OrderItem::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(CustomerOrder::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Shipment::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Payment::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Buyer::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Address::Table).to_owned())
                .await
        }
    }

    #[derive(Iden)]
    pub enum Address {
        Table,
        Id,
        Street,
        HouseNumber,
        ApartmentNumber,
        City,
        State,
        Country,
        PostalCode,
    }

    #[derive(Iden)]
    pub enum Buyer {
        Table,
        Id,
        FirstName,
        LastName,
        Email,
        Phone,
        BillingAddressId,
        ShippingAddressId,
        ReceivePromoEmails,
    }

    #[derive(Iden)]
    pub enum Payment {
        Table,
        Id,
        Method,
        Currency,
        ProviderIntentId,
        TransactionAmount,
        Payer,
        Payee,
        Done,
    }

    #[derive(Iden)]
    pub enum Shipment {
        Table,
        Id,
        CarrierId,
        TrackingCode,
        ShippingDate,
        EstimatedArrivalDate,
    }

    #[derive(Iden)]
    pub enum CustomerOrder {
        Table,
        Id,
        Uuid,
        PlacedAt,
        Status,
        TotalPrice,
        Currency,
        RefundedAmount,
        PromoId,
        PaymentId,
        ShipmentId,
        BuyerId,
        ExpiresAt,
    }

    #[derive(Iden)]
    pub enum OrderItem {
        Table,
        Id,
        OrderId,
        ProductId,
        SizeId,
        Quantity,
        UnitBasePrice,
        SalePercentage,
    }

    #[derive(Iden)]
    pub enum OrderStatusHistory {
        Table,
        Id,
        OrderId,
        Status,
        ChangedAt,
    }
}
