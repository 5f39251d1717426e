pub mod correlation; // Sparse signature cosine correlation
pub mod counts; // Proteome parsing into dense k-mer counts
pub mod encoding; // Residue alphabet and k-mer index space
pub mod error;
pub mod list; // Genome list file reader
pub mod matrix; // Dense lower-triangular correlation matrix
pub mod pipeline; // Staged load/transform/compare coordinator
pub mod queue; // Bounded blocking queue coupling the stages
pub mod signature; // Stochastic deviation transform
pub mod utils;
