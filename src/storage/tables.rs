use redb::TableDefinition;

/// Local key-value storage: fixed key -> msgpack value
pub const LOCAL_STORAGE: TableDefinition<&str, &[u8]> = TableDefinition::new("local_storage");

/// file id -> FileRecord
pub const FILES_KEY: &str = "fileshare_files";

/// user id -> (file id -> Reaction)
pub const USER_REACTIONS_KEY: &str = "fileshare_user_reactions";

/// Anonymous id of the local user
pub const USER_ID_KEY: &str = "fileshare_user_id";
