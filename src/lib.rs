//! 调度服务的组装: 读取配置, 创建存储, 锁, 调度器和 worker

pub mod app;
