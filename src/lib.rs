//! Multi-sensor data-acquisition node for fab process stations.
//!
//! A station node samples temperature/humidity, ambient light, particulate
//! count and vibration from heterogeneous buses (I2C, UART), assembles one
//! record per cycle and publishes it to a broker. The crate is the
//! synchronization and aggregation core: a fixed-period scheduler fans out
//! to per-sensor producer tasks guarded by shared-bus mutexes, their outputs
//! flow through bounded single-producer/single-consumer channels into an
//! aggregator, and a vibration task gets an uncontended scheduling window
//! for its high-rate sample burst.
//!
//! Hardware specifics stay outside: sensors are [`sensor::SensorDriver`]
//! implementations over `embedded-hal-async`/`embedded-io-async` buses, the
//! broker is a [`publish::Publisher`]. The `std` feature enables a host
//! simulation binary (`station-sim`) that runs the whole pipeline against
//! synthetic drivers.

#![cfg_attr(not(feature = "std"), no_std)]
#![allow(async_fn_in_trait)]

pub mod battery;
pub mod bus;
pub mod config;
pub mod context;
pub mod drivers;
pub mod error;
pub mod message;
pub mod publish;
pub mod readings;
pub mod retry;
pub mod scheduler;
pub mod sensor;
pub mod signals;
pub mod sim;
pub mod tasks;
pub mod vibration;
