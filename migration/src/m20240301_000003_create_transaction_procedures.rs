use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

/// Each procedure reports its outcome as text so callers can tell a row that
/// was not in the required state apart from a database failure:
/// `applied`, `duplicate` (insert only), `state_conflict`, `rejected`.
const CREATE_INSERT: &str = r#"
CREATE OR REPLACE FUNCTION transaction_insert(
    p_public_address TEXT,
    p_txid TEXT,
    p_vout INTEGER,
    p_confirmations INTEGER,
    p_amount NUMERIC
) RETURNS TEXT AS $$
BEGIN
    INSERT INTO tracked_transaction (public_address, txid, vout, confirmations, amount, state)
    VALUES (p_public_address, p_txid, p_vout, p_confirmations, p_amount, 'unconfirmed')
    ON CONFLICT (public_address, txid, vout) DO NOTHING;

    IF FOUND THEN
        RETURN 'applied';
    END IF;
    RETURN 'duplicate';
END;
$$ LANGUAGE plpgsql;
"#;

const CREATE_CONFIRM: &str = r#"
CREATE OR REPLACE FUNCTION transaction_confirm(
    p_public_address TEXT,
    p_txid TEXT,
    p_vout INTEGER,
    p_confirmations INTEGER
) RETURNS TEXT AS $$
BEGIN
    UPDATE tracked_transaction
       SET state = 'confirmed', confirmations = p_confirmations, updated_at = now()
     WHERE public_address = p_public_address AND txid = p_txid AND vout = p_vout
       AND state = 'unconfirmed';

    IF FOUND THEN
        RETURN 'applied';
    END IF;
    RETURN 'state_conflict';
END;
$$ LANGUAGE plpgsql;
"#;

const CREATE_CREDIT: &str = r#"
CREATE OR REPLACE FUNCTION transaction_credit(
    p_public_address TEXT,
    p_txid TEXT,
    p_vout INTEGER,
    p_multiplier NUMERIC
) RETURNS TEXT AS $$
DECLARE
    v_amount NUMERIC;
BEGIN
    SELECT amount INTO v_amount
      FROM tracked_transaction
     WHERE public_address = p_public_address AND txid = p_txid AND vout = p_vout
       AND state = 'confirmed'
       FOR UPDATE;

    IF NOT FOUND THEN
        RETURN 'state_conflict';
    END IF;

    UPDATE account
       SET balance = balance + v_amount * p_multiplier
     WHERE public_address = p_public_address;

    -- A deposit to an address no account owns can never be credited
    IF NOT FOUND THEN
        UPDATE tracked_transaction
           SET state = 'error', updated_at = now()
         WHERE public_address = p_public_address AND txid = p_txid AND vout = p_vout;
        RETURN 'rejected';
    END IF;

    UPDATE tracked_transaction
       SET state = 'credited', updated_at = now()
     WHERE public_address = p_public_address AND txid = p_txid AND vout = p_vout;
    RETURN 'applied';
END;
$$ LANGUAGE plpgsql;
"#;

const CREATE_SPEND: &str = r#"
CREATE OR REPLACE FUNCTION transaction_spend(
    p_public_address TEXT,
    p_txid TEXT,
    p_vout INTEGER,
    p_spent_txid TEXT
) RETURNS TEXT AS $$
BEGIN
    UPDATE tracked_transaction
       SET state = 'spent', spent_txid = p_spent_txid, updated_at = now()
     WHERE public_address = p_public_address AND txid = p_txid AND vout = p_vout
       AND state = 'credited';

    IF FOUND THEN
        RETURN 'applied';
    END IF;
    RETURN 'state_conflict';
END;
$$ LANGUAGE plpgsql;
"#;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let conn = manager.get_connection();
        for sql in [CREATE_INSERT, CREATE_CONFIRM, CREATE_CREDIT, CREATE_SPEND] {
            conn.execute_unprepared(sql).await?;
        }
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .get_connection()
            .execute_unprepared(
                "DROP FUNCTION IF EXISTS transaction_insert(TEXT, TEXT, INTEGER, INTEGER, NUMERIC);
                 DROP FUNCTION IF EXISTS transaction_confirm(TEXT, TEXT, INTEGER, INTEGER);
                 DROP FUNCTION IF EXISTS transaction_credit(TEXT, TEXT, INTEGER, NUMERIC);
                 DROP FUNCTION IF EXISTS transaction_spend(TEXT, TEXT, INTEGER, TEXT);",
            )
            .await?;
        Ok(())
    }
}
