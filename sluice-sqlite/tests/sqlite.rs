#[cfg(test)]
mod tests {
    use indoc::indoc;
    use log::LevelFilter;
    use rust_decimal::Decimal;
    use sluice::{
        Batch, Connection, Deconstruct, Error, FromRow, NamedParam, Query, Result, RowWriter,
        Value, column, savepoint, scalar, string, transaction,
    };
    use sluice_sqlite::{GENERATED_KEY, SqliteConnection};
    use std::{env, fs, path::Path, str::FromStr, sync::Mutex};
    use time::{Date, Month, PrimitiveDateTime, Time};
    use uuid::Uuid;

    static MUTEX: Mutex<()> = Mutex::new(());

    fn init_logs() {
        let mut logger = env_logger::builder();
        logger
            .is_test(true)
            .format_file(true)
            .format_line_number(true);
        if env::var("RUST_LOG").is_err() {
            logger.filter_level(LevelFilter::Warn);
        }
        let _ = logger.try_init();
    }

    #[derive(Debug, Clone, PartialEq, Deconstruct, FromRow)]
    struct Account {
        id: Option<i64>,
        owner: String,
        balance: Decimal,
        opened: Date,
        #[allow(non_snake_case)]
        lastSeen: Option<PrimitiveDateTime>,
        external: Uuid,
    }

    const INSERT: &str = indoc! {"
        INSERT INTO account(id, owner, balance, opened, last_seen, external)
        VALUES(:id, :owner, :balance, :opened, :last_seen, :external)
    "};

    fn account(owner: &str, balance: &str) -> Account {
        Account {
            id: None,
            owner: owner.into(),
            balance: Decimal::from_str(balance).unwrap(),
            opened: Date::from_calendar_date(2024, Month::March, 1).unwrap(),
            lastSeen: None,
            external: Uuid::from_u128(0x67e5504410b1426f9247bb680e5fe0c8),
        }
    }

    fn connect() -> SqliteConnection {
        let mut connection =
            SqliteConnection::connect("sqlite://:memory:").expect("Could not open the database");
        connection
            .execute_sql(indoc! {"
                CREATE TABLE account (
                    id INTEGER PRIMARY KEY,
                    owner TEXT NOT NULL UNIQUE,
                    balance NUMERIC NOT NULL,
                    opened TEXT NOT NULL,
                    last_seen TEXT,
                    external TEXT NOT NULL
                );
            "})
            .expect("Could not create the table");
        connection
    }

    fn count(connection: &mut SqliteConnection) -> i64 {
        Query::new("SELECT COUNT(*) FROM account")
            .query_as(connection, &scalar::<i64>().single())
            .unwrap()
    }

    #[test]
    fn create_database() {
        init_logs();
        const DB_PATH: &str = "../target/debug/creation.sqlite";
        let _guard = MUTEX.lock().unwrap();
        if Path::new(DB_PATH).exists() {
            fs::remove_file(DB_PATH)
                .unwrap_or_else(|_| panic!("Failed to remove test database file {}", DB_PATH));
        }
        assert!(
            !Path::new(DB_PATH).exists(),
            "Database file should not exist before test"
        );
        SqliteConnection::connect(&format!("sqlite://{}?mode=rwc", DB_PATH))
            .expect("Could not open the database");
        assert!(
            Path::new(DB_PATH).exists(),
            "Database file should be created after connection"
        );
        assert!(SqliteConnection::connect("postgres://localhost").is_err());
    }

    #[test]
    fn insert_and_read() {
        init_logs();
        let mut connection = connect();
        let writer = RowWriter::<Account>::derived().unwrap();
        let mut ada = account("ada", "12.50");
        ada.lastSeen = Some(PrimitiveDateTime::new(
            ada.opened,
            Time::from_hms(10, 20, 30).unwrap(),
        ));
        let key = Query::new(INSERT)
            .using(&writer, &ada)
            .execute_insert(&mut connection, &column::<i64>(GENERATED_KEY))
            .unwrap();
        assert_eq!(key, Some(1));
        let grace = account("grace", "100");
        let key = Query::new(INSERT)
            .using(&writer, &grace)
            .execute_insert(&mut connection, &column::<i64>(GENERATED_KEY))
            .unwrap();
        assert_eq!(key, Some(2));

        let accounts = Query::new("SELECT * FROM account ORDER BY id")
            .query_as(&mut connection, &Account::row_reader().list())
            .unwrap();
        assert_eq!(
            accounts,
            [
                Account { id: Some(1), ..ada },
                Account {
                    id: Some(2),
                    ..grace
                }
            ]
        );

        let owner = Query::new("SELECT owner FROM account WHERE id = :id")
            .on(NamedParam::value("id", 3))
            .query_as(&mut connection, &string("owner").optional())
            .unwrap();
        assert_eq!(owner, None);

        let key = Query::new("UPDATE account SET balance = 0 WHERE id = :id")
            .on(NamedParam::value("id", 1))
            .execute_insert(&mut connection, &column::<i64>(GENERATED_KEY))
            .unwrap();
        assert_eq!(key, None);
    }

    #[test]
    fn generated_key_with_reused_rowid() {
        init_logs();
        let mut connection = connect();
        let writer = RowWriter::<Account>::derived().unwrap();
        let key = Query::new(INSERT)
            .using(&writer, &account("a", "1"))
            .execute_insert(&mut connection, &column::<i64>(GENERATED_KEY))
            .unwrap();
        assert_eq!(key, Some(1));
        Query::new("DELETE FROM account")
            .execute(&mut connection)
            .unwrap();
        let again = Account {
            id: Some(1),
            ..account("b", "1")
        };
        let key = Query::new(INSERT)
            .using(&writer, &again)
            .execute_insert(&mut connection, &column::<i64>(GENERATED_KEY))
            .unwrap();
        assert_eq!(key, Some(1));
    }

    #[test]
    fn multi_valued_parameter() {
        init_logs();
        let mut connection = connect();
        let writer = RowWriter::<Account>::derived().unwrap();
        let accounts: Vec<_> = ["a", "b", "c", "d"]
            .into_iter()
            .map(|v| account(v, "1"))
            .collect();
        Query::new(INSERT)
            .execute_batch(&mut connection, Batch::using(&writer, &accounts))
            .unwrap();
        let found = Query::new(indoc! {"
            SELECT owner FROM account
            WHERE owner IN(:owners) OR (owner = :extra AND owner <> ':owners')
            ORDER BY owner
        "})
        .on(NamedParam::values("owners", ["a", "c"]).unwrap())
        .on(NamedParam::value("extra", "d"))
        .query_as(&mut connection, &string("owner").list())
        .unwrap();
        assert_eq!(found, ["a", "c", "d"]);
    }

    #[test]
    fn update_counts() {
        init_logs();
        let mut connection = connect();
        assert_eq!(
            Query::new("CREATE TABLE other(id INTEGER)")
                .execute_update(&mut connection)
                .unwrap(),
            0
        );
        let writer = RowWriter::<Account>::derived().unwrap();
        let accounts = [account("a", "1"), account("b", "2"), account("c", "3")];
        let counts = Query::new(INSERT)
            .execute_update_batch(&mut connection, Batch::using(&writer, &accounts))
            .unwrap();
        assert_eq!(counts, [1, 1, 1]);
        let updated = Query::new("UPDATE account SET balance = balance + :amount")
            .on(NamedParam::value("amount", 5))
            .execute_update(&mut connection)
            .unwrap();
        assert_eq!(updated, 3);
        assert!(
            Query::new("SELECT * FROM account")
                .execute(&mut connection)
                .unwrap()
        );
        assert!(
            !Query::new("DELETE FROM account WHERE owner = :owner")
                .on(NamedParam::value("owner", "a"))
                .execute(&mut connection)
                .unwrap()
        );
        assert_eq!(count(&mut connection), 2);
    }

    #[test]
    fn batch_fail_fast() {
        init_logs();
        let mut connection = connect();
        let writer = RowWriter::<Account>::derived().unwrap();
        let accounts = [account("a", "1"), account("a", "2"), account("b", "3")];
        let error = Query::new(INSERT)
            .execute_batch(&mut connection, Batch::using(&writer, &accounts))
            .unwrap_err();
        assert!(error.to_string().contains("Batch row 1 failed"));
        assert!(format!("{error:#}").contains("UNIQUE"));
        assert_eq!(count(&mut connection), 1);
    }

    #[test]
    fn transactions() {
        init_logs();
        let mut connection = connect();
        let writer = RowWriter::<Account>::derived().unwrap();
        let insert = |connection: &mut SqliteConnection, owner: &str| -> Result<u64> {
            Query::new(INSERT)
                .using(&writer, &account(owner, "1"))
                .execute_update(connection)
        };

        transaction(&mut connection, |connection| {
            insert(connection, "a")?;
            insert(connection, "b")
        })
        .unwrap();
        assert_eq!(count(&mut connection), 2);
        assert!(connection.auto_commit().unwrap());
        assert!(!connection.in_transaction());

        let error = transaction(&mut connection, |connection| {
            insert(connection, "c")?;
            insert(connection, "a")
        })
        .unwrap_err();
        assert!(format!("{error:#}").contains("UNIQUE"));
        assert_eq!(count(&mut connection), 2);

        transaction(&mut connection, |connection| {
            insert(connection, "d")?;
            let nested = savepoint(connection, "inner", |connection| {
                insert(connection, "e")?;
                Err::<(), _>(Error::msg("Abandoned"))
            });
            assert!(nested.is_err());
            savepoint(connection, "kept", |connection| insert(connection, "f"))
        })
        .unwrap();
        let owners = Query::new("SELECT owner FROM account ORDER BY owner")
            .query_as(&mut connection, &string("owner").list())
            .unwrap();
        assert_eq!(owners, ["a", "b", "d", "f"]);
    }

    #[test]
    fn manual_auto_commit() {
        init_logs();
        let mut connection = connect();
        connection.set_auto_commit(false).unwrap();
        Query::new("DELETE FROM account").execute(&mut connection).unwrap();
        assert!(connection.in_transaction());
        connection.rollback().unwrap();
        assert!(!connection.in_transaction());
        let writer = RowWriter::<Account>::derived().unwrap();
        Query::new(INSERT)
            .using(&writer, &account("a", "1"))
            .execute(&mut connection)
            .unwrap();
        connection.set_auto_commit(true).unwrap();
        assert!(!connection.in_transaction());
        assert_eq!(count(&mut connection), 1);
    }

    #[test]
    fn lazy_rows() {
        init_logs();
        let mut connection = connect();
        let writer = RowWriter::<Account>::derived().unwrap();
        let accounts: Vec<_> = (0..5).map(|i| account(&format!("o{i}"), "1")).collect();
        Query::new(INSERT)
            .execute_batch(&mut connection, Batch::using(&writer, &accounts))
            .unwrap();
        let query = Query::new("SELECT owner FROM account WHERE balance >= :min ORDER BY owner")
            .on(NamedParam::value("min", 1));
        let mut statement = query.prepare(&mut connection).unwrap();
        let parameters = query.parameters().unwrap();
        {
            let mut rows = statement.rows(&parameters, string("owner")).unwrap();
            assert_eq!(rows.next().unwrap().unwrap(), "o0");
            assert_eq!(rows.next().unwrap().unwrap(), "o1");
        }
        let all = statement
            .rows(&parameters, string("owner"))
            .unwrap()
            .collect::<Result<Vec<_>>>()
            .unwrap();
        assert_eq!(all.len(), 5);
    }

    #[test]
    fn invalid_queries() {
        init_logs();
        let mut connection = connect();
        let error = Query::new("SELECT 1; SELECT 2")
            .execute(&mut connection)
            .unwrap_err();
        assert!(format!("{error:#}").contains("more than one statement"));
        let error = Query::new("SELECT * FROM missing")
            .execute(&mut connection)
            .unwrap_err();
        assert!(format!("{error:#}").contains("no such table"));
        #[derive(Debug)]
        struct Unknown;
        let error = Query::new("SELECT :value")
            .on(NamedParam::value("value", Value::opaque(Unknown)))
            .execute(&mut connection)
            .unwrap_err();
        assert!(format!("{error:#}").contains("Unknown"));
    }
}
