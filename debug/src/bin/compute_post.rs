//! Compute-then-sample dependency: a compute pass fills a storage texture,
//! a render pass samples it. The graph inserts the UnorderedAccess to
//! ShaderResource transition between the two on its own; this program prints
//! the stream so that is visible.

use ember_render::RdgBuilder;
use ember_rhi::soft::SoftDevice;
use ember_rhi::{
    AttachmentLoadOp, AttachmentStoreOp, Backend, BackendInfo, Color4, CommandPool,
    CommandPoolInfo, Device, Extent3D, Format, QueueInfo, ResourceTypeFlags, RootSignatureInfo,
    ShaderFrequency, ShaderResourceEntry, TextureSubresourceRange, TextureViewType,
};

fn main() {
    env_logger::init();

    let device = Backend::init(BackendInfo { enable_debug: true, ..Default::default() });
    let queue = device.get_queue(&QueueInfo::default());
    let command_pool = CommandPool::new(device.clone(), CommandPoolInfo { queue });

    // set 0: the storage image for the compute pass and the sampled image
    // for the composite pass.
    let root_signature = device
        .create_root_signature(
            RootSignatureInfo::new()
                .add_entry(ShaderResourceEntry {
                    set: 0,
                    binding: 0,
                    resource_type: ResourceTypeFlags::RW_TEXTURE,
                    frequency: ShaderFrequency::COMPUTE,
                    ..Default::default()
                })
                .add_entry(ShaderResourceEntry {
                    set: 0,
                    binding: 1,
                    resource_type: ResourceTypeFlags::TEXTURE,
                    frequency: ShaderFrequency::FRAGMENT,
                    ..Default::default()
                }),
        )
        .expect("root signature creation failed");

    let command = command_pool.create_command_list(true).expect("command list checkout");
    let mut builder = RdgBuilder::new(device.clone(), command);

    let output = builder
        .create_texture("OutputTex")
        .format(Format::Rgba16Sfloat)
        .extent(Extent3D::new(512, 512, 1))
        .allow_read_write()
        .finish();
    let lit = builder
        .create_texture("LitScene")
        .format(Format::Rgba8Unorm)
        .extent(Extent3D::new(512, 512, 1))
        .allow_render_target()
        .finish();

    builder
        .create_compute_pass("NoisePass")
        .root_signature(root_signature.clone())
        .read_write_texture(0, 0, 0, output, TextureViewType::D2, TextureSubresourceRange::default())
        .execute(|ctx| {
            if let Some(descriptor) = &ctx.descriptors[0] {
                ctx.command.bind_descriptor_set(descriptor, 0);
            }
            ctx.command.dispatch(512 / 8, 512 / 8, 1);
        })
        .finish();

    builder
        .create_render_pass("CompositePass")
        .root_signature(root_signature)
        .read_texture(0, 1, 0, output, TextureViewType::D2, TextureSubresourceRange::default())
        .color(
            0,
            lit,
            AttachmentLoadOp::Clear,
            AttachmentStoreOp::Store,
            Color4::default(),
            TextureSubresourceRange::default(),
        )
        .execute(|ctx| {
            if let Some(descriptor) = &ctx.descriptors[0] {
                ctx.command.bind_descriptor_set(descriptor, 0);
            }
            ctx.command.draw(3, 1, 0, 0);
        })
        .finish();

    builder.export_graphviz("compute_post.dot");
    builder.execute();
    builder.command().execute(None, None, None);

    if let Some(soft) = device.as_any().downcast_ref::<SoftDevice>() {
        println!("recorded command stream:");
        for record in soft.take_journal() {
            println!("  {record:?}");
        }
    }
}
