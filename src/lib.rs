//! A small convolutional network engine.
//!
//! Networks are linear pipelines of layers over 3-D activation volumes
//! ([`Vol`]). Architectures are declared as [`LayerDef`] lists (in code or
//! loaded from JSON), desugared into explicit layers, and trained with
//! hand-written backpropagation through [`Trainer`].
//!
//! # Example
//!
//! ```
//! use convnet::{LayerDef, LossTarget, Net, SimpleRng, Trainer, TrainerConfig, Vol};
//!
//! let mut input = LayerDef::of_type("input");
//! input.out_sx = Some(1);
//! input.out_sy = Some(1);
//! input.out_depth = Some(2);
//!
//! let mut hidden = LayerDef::of_type("fc");
//! hidden.filters = Some(6);
//! hidden.activation = Some("tanh".to_string());
//!
//! let mut loss = LayerDef::of_type("softmax");
//! loss.num_classes = Some(2);
//!
//! let mut rng = SimpleRng::new(42);
//! let mut net = Net::new(&[input, hidden, loss], &mut rng).unwrap();
//! let mut trainer = Trainer::new(TrainerConfig::default()).unwrap();
//!
//! let x = Vol::from_flat(&[0.3, -0.6]);
//! trainer.train(&mut net, &x, &LossTarget::Class(1)).unwrap();
//! net.forward(&x, false);
//! let class = net.prediction().unwrap();
//! assert!(class < 2);
//! ```

pub mod architecture;
pub mod error;
pub mod json;
pub mod layers;
pub mod net;
pub mod trainer;
pub mod utils;
pub mod vol;

pub use architecture::{desugar, load_net_def, LayerDef, NetDef};
pub use error::NetError;
pub use json::{LayerJson, NetJson, VolJson};
pub use layers::{Layer, LossTarget, ParamsAndGrads};
pub use net::Net;
pub use trainer::{Method, TrainStats, Trainer, TrainerConfig};
pub use utils::SimpleRng;
pub use vol::Vol;
