pub mod address;
pub mod buyer;
pub mod category;
pub mod currency_rate;
pub mod order;
pub mod order_item;
pub mod order_status;
pub mod order_status_history;
pub mod payment;
pub mod payment_method;
pub mod product;
pub mod product_price;
pub mod product_size;
pub mod promo_code;
pub mod shipment;
pub mod shipment_carrier;
pub mod shipment_carrier_price;
pub mod size;
