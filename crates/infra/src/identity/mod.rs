//! Identity provider adapters

pub mod supabase;

pub use supabase::SupabaseAuthClient;
