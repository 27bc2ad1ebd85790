use async_trait::async_trait;
use rand::Rng;
use rand::distributions::Alphanumeric;
use rusqlite::{Connection, OptionalExtension};
use tracing::{debug, info};
use uuid::Uuid;

use partygrid_core::{
    catalog::Element,
    ids::*,
    slot::GridKind,
};

use crate::error::StorageError;
use crate::traits::{
    Authorization, BearerToken, CreatedParty, EditKey, ItemPatch, ItemRecord, NewGridItem,
    PartyBackend, PartyDetails, PartyRecord,
};

const SHORTCODE_LEN: usize = 6;
const SHORTCODE_ATTEMPTS: usize = 8;

fn hash_secret(secret: &str) -> [u8; 32] {
    *blake3::hash(secret.as_bytes()).as_bytes()
}

fn new_edit_key() -> EditKey {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill(&mut bytes[..]);
    let hex: String = bytes.iter().map(|b| format!("{b:02x}")).collect();
    EditKey::new(hex)
}

fn new_shortcode() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(SHORTCODE_LEN)
        .map(char::from)
        .collect()
}

fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    matches!(err, rusqlite::Error::SqliteFailure(e, _) if e.code == rusqlite::ErrorCode::ConstraintViolation)
}

/// Embedded party backend on SQLite.
///
/// Enforces the same rules as the hosted API: one item per
/// `(party, kind, position)`, and every write authorized by the owner's
/// bearer token or the party's edit key.
pub struct SqliteBackend {
    conn: Connection,
}

impl SqliteBackend {
    pub fn open(path: &str) -> Result<Self, StorageError> {
        let conn = Connection::open(path)?;
        crate::schema::init_schema(&conn)?;
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory()?;
        crate::schema::init_schema(&conn)?;
        Ok(Self { conn })
    }

    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    pub fn register_user(&self, name: &str, token: &BearerToken) -> Result<UserId, StorageError> {
        let user_id = UserId::new(Uuid::now_v7().to_string());
        let result = self.conn.execute(
            "INSERT INTO users (user_id, name, token_hash) VALUES (?1, ?2, ?3)",
            rusqlite::params![user_id.as_str(), name, &hash_secret(token.expose())[..]],
        );
        match result {
            Ok(_) => Ok(user_id),
            Err(e) if is_constraint_violation(&e) => {
                Err(StorageError::ConstraintViolation(format!("bearer token for {name} is already registered")))
            }
            Err(e) => Err(StorageError::Sqlite(e)),
        }
    }

    fn user_for_token(&self, token: &BearerToken) -> Result<UserId, StorageError> {
        self.conn
            .query_row(
                "SELECT user_id FROM users WHERE token_hash = ?1",
                [&hash_secret(token.expose())[..]],
                |row| row.get::<_, String>(0),
            )
            .optional()?
            .map(UserId::new)
            .ok_or_else(|| StorageError::Unauthorized("unknown bearer token".into()))
    }

    fn authorize(&self, auth: &Authorization, party: &RemotePartyId) -> Result<(), StorageError> {
        let row: Option<(Option<String>, Option<Vec<u8>>)> = self
            .conn
            .query_row(
                "SELECT owner_id, edit_key_hash FROM parties WHERE party_id = ?1",
                [party.as_str()],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;
        let (owner, key_hash) = row.ok_or_else(|| StorageError::NotFound(format!("party {party}")))?;

        match auth {
            Authorization::Bearer(token) => {
                let user = self.user_for_token(token)?;
                if owner.as_deref() != Some(user.as_str()) {
                    return Err(StorageError::Unauthorized(format!("party {party} is not owned by {user}")));
                }
            }
            Authorization::EditKey(key) => {
                if key_hash.as_deref() != Some(&hash_secret(key.expose())[..]) {
                    return Err(StorageError::Unauthorized(format!("edit key does not match party {party}")));
                }
            }
        }
        Ok(())
    }

    fn read_items(&self, party: &RemotePartyId) -> Result<Vec<ItemRecord>, StorageError> {
        let mut stmt = self.conn.prepare(
            "SELECT item_id, kind, catalog_id, position, uncap_level, transcendence_step, element
             FROM grid_items WHERE party_id = ?1 ORDER BY kind, position",
        )?;
        let rows = stmt.query_map([party.as_str()], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, i32>(3)?,
                row.get::<_, u8>(4)?,
                row.get::<_, u8>(5)?,
                row.get::<_, Option<u8>>(6)?,
            ))
        })?;

        let mut items = Vec::new();
        for row in rows {
            let (id, kind, catalog_id, position, uncap_level, transcendence_step, element) = row?;
            items.push(ItemRecord {
                id: RemoteItemId::new(id),
                kind: GridKind::parse(&kind)?,
                catalog_id: CatalogId::new(catalog_id),
                position,
                uncap_level,
                transcendence_step,
                element: element.map(Element::try_from).transpose()?,
            });
        }
        Ok(items)
    }
}

#[async_trait(?Send)]
impl PartyBackend for SqliteBackend {
    async fn create_party(
        &self,
        auth: Option<&Authorization>,
        details: &PartyDetails,
    ) -> Result<CreatedParty, StorageError> {
        let (owner, edit_key) = match auth {
            Some(Authorization::Bearer(token)) => (Some(self.user_for_token(token)?), None),
            Some(Authorization::EditKey(_)) => {
                return Err(StorageError::Unauthorized("edit keys cannot create parties".into()));
            }
            None => (None, Some(new_edit_key())),
        };
        let key_hash = edit_key.as_ref().map(|k| hash_secret(k.expose()).to_vec());
        let id = RemotePartyId::new(Uuid::now_v7().to_string());

        for _ in 0..SHORTCODE_ATTEMPTS {
            let shortcode = new_shortcode();
            let result = self.conn.execute(
                "INSERT INTO parties (party_id, shortcode, name, description, owner_id, edit_key_hash)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                rusqlite::params![
                    id.as_str(),
                    shortcode,
                    details.name,
                    details.description,
                    owner.as_ref().map(UserId::as_str),
                    key_hash,
                ],
            );
            match result {
                Ok(_) => {
                    info!(party = %id, %shortcode, anonymous = owner.is_none(), "party created");
                    return Ok(CreatedParty { id, shortcode, edit_key, owner });
                }
                Err(e) if is_constraint_violation(&e) => {
                    debug!(%shortcode, "shortcode collision, retrying");
                }
                Err(e) => return Err(StorageError::Sqlite(e)),
            }
        }
        Err(StorageError::ConstraintViolation("could not allocate a unique shortcode".into()))
    }

    async fn fetch_party(&self, shortcode: &str) -> Result<PartyRecord, StorageError> {
        let row: Option<(String, String, String, Option<String>)> = self
            .conn
            .query_row(
                "SELECT party_id, name, description, owner_id FROM parties WHERE shortcode = ?1",
                [shortcode],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
            )
            .optional()?;
        let (id, name, description, owner) =
            row.ok_or_else(|| StorageError::NotFound(format!("shortcode {shortcode}")))?;
        let id = RemotePartyId::new(id);
        let items = self.read_items(&id)?;
        Ok(PartyRecord {
            id,
            shortcode: shortcode.to_string(),
            details: PartyDetails { name, description },
            owner: owner.map(UserId::new),
            items,
        })
    }

    async fn update_party(
        &self,
        auth: &Authorization,
        party: &RemotePartyId,
        details: &PartyDetails,
    ) -> Result<(), StorageError> {
        self.authorize(auth, party)?;
        self.conn.execute(
            "UPDATE parties SET name = ?1, description = ?2 WHERE party_id = ?3",
            rusqlite::params![details.name, details.description, party.as_str()],
        )?;
        Ok(())
    }

    async fn destroy_party(
        &self,
        auth: &Authorization,
        party: &RemotePartyId,
    ) -> Result<(), StorageError> {
        self.authorize(auth, party)?;
        let tx = self.conn.unchecked_transaction()?;
        tx.execute("DELETE FROM grid_items WHERE party_id = ?1", [party.as_str()])?;
        tx.execute("DELETE FROM parties WHERE party_id = ?1", [party.as_str()])?;
        tx.commit()?;
        info!(party = %party, "party destroyed");
        Ok(())
    }

    async fn add_item(
        &self,
        auth: &Authorization,
        party: &RemotePartyId,
        item: &NewGridItem,
    ) -> Result<RemoteItemId, StorageError> {
        self.authorize(auth, party)?;
        partygrid_core::slot::resolve_offset(item.kind, item.position)?;
        let item_id = RemoteItemId::new(Uuid::now_v7().to_string());
        let result = self.conn.execute(
            "INSERT INTO grid_items (item_id, party_id, kind, catalog_id, position, uncap_level, transcendence_step, element)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            rusqlite::params![
                item_id.as_str(),
                party.as_str(),
                item.kind.as_str(),
                item.catalog_id.as_str(),
                item.position,
                item.uncap_level,
                item.transcendence_step,
                item.element.map(u8::from),
            ],
        );
        match result {
            Ok(_) => Ok(item_id),
            Err(e) if is_constraint_violation(&e) => Err(StorageError::ConstraintViolation(format!(
                "{} slot {} of party {party} is occupied",
                item.kind, item.position
            ))),
            Err(e) => Err(StorageError::Sqlite(e)),
        }
    }

    async fn remove_item(
        &self,
        auth: &Authorization,
        party: &RemotePartyId,
        kind: GridKind,
        item: &RemoteItemId,
    ) -> Result<(), StorageError> {
        self.authorize(auth, party)?;
        let removed = self.conn.execute(
            "DELETE FROM grid_items WHERE item_id = ?1 AND party_id = ?2 AND kind = ?3",
            rusqlite::params![item.as_str(), party.as_str(), kind.as_str()],
        )?;
        if removed == 0 {
            return Err(StorageError::NotFound(format!("{kind} {item}")));
        }
        Ok(())
    }

    async fn update_item(
        &self,
        auth: &Authorization,
        party: &RemotePartyId,
        kind: GridKind,
        item: &RemoteItemId,
        patch: &ItemPatch,
    ) -> Result<(), StorageError> {
        self.authorize(auth, party)?;
        let updated = self.conn.execute(
            "UPDATE grid_items SET
                uncap_level = coalesce(?1, uncap_level),
                transcendence_step = coalesce(?2, transcendence_step),
                element = coalesce(?3, element)
             WHERE item_id = ?4 AND party_id = ?5 AND kind = ?6",
            rusqlite::params![
                patch.uncap_level,
                patch.transcendence_step,
                patch.element.map(u8::from),
                item.as_str(),
                party.as_str(),
                kind.as_str(),
            ],
        )?;
        if updated == 0 {
            return Err(StorageError::NotFound(format!("{kind} {item}")));
        }
        Ok(())
    }
}
