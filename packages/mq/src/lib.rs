pub mod models;

pub use models::{
    BroccoliBus, BroccoliError, BrokerMessage, DisabledBus, MqConfig, MqQueue, init_mq,
};

pub type Mq = MqQueue;
