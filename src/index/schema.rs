// @generated manually, mirrors the tables migrations/ would create.

diesel::table! {
    postings (id) {
        id -> Int8,
        hash -> Int8,
        track_id -> Int4,
        t_anchor -> Int4,
    }
}

diesel::table! {
    index_meta (id) {
        id -> Int4,
        param_digest -> Bytea,
    }
}
