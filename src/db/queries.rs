pub const SELECT_TRUCK_BY_ID: &str = r#"
SELECT id,
       license_plate_number,
       manufacturer,
       capacity,
       price_per_km::float8 AS price_per_km,
       year,
       tow_type,
       business_id
FROM trucks
WHERE id = $1;
"#;

pub const SELECT_TRUCK_ASSIGNED_TO_USER: &str = r#"
SELECT EXISTS (
    SELECT 1 FROM users_trucks WHERE truck_id = $1 AND user_id = $2
) AS assigned;
"#;

pub const SELECT_DRIVER_EXISTS: &str = r#"
SELECT EXISTS (
    SELECT 1 FROM driver_details WHERE user_id = $1
) AS present;
"#;
