pub mod feature_tsv;

pub use feature_tsv::{
    read_component_table, read_feature_table, read_participants, write_feature_table,
    ComponentTable, FeatureLayout, ParticipantRecord,
};
