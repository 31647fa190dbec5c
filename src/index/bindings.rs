use diesel::prelude::*;

#[derive(Queryable, Selectable, Debug)]
#[diesel(table_name = crate::index::schema::postings)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct PostingRow {
    pub id: i64,
    pub hash: i64,
    pub track_id: i32,
    pub t_anchor: i32,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = crate::index::schema::postings)]
pub struct NewPostingRow {
    pub hash: i64,
    pub track_id: i32,
    pub t_anchor: i32,
}

#[derive(Queryable, Selectable, Debug)]
#[diesel(table_name = crate::index::schema::index_meta)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct IndexMetaRow {
    pub id: i32,
    pub param_digest: Vec<u8>,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = crate::index::schema::index_meta)]
pub struct NewIndexMetaRow {
    pub id: i32,
    pub param_digest: Vec<u8>,
}
